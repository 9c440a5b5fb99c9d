fn main() {
    thermosense_lib::run()
}
