fn main() {
    // dladdr can only name functions that are in the dynamic symbol table
    println!("cargo:rustc-link-arg-bins=-rdynamic");
}
