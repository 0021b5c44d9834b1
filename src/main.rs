fn main() {
    hemiscope::run()
}
