fn main() {
    tensorgen::cli()
}
