fn main() {
    stope::main();
}
