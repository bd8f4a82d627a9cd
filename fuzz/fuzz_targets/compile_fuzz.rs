//! Full pipeline fuzz target: parse, resolve and lower must never panic, and lowering a unit
//! twice gives the same text.
//! Build with: cargo fuzz run compile_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let options = tlspl::GenOptions::default();
    let first = tlspl::compile_checked(s, &options);
    if first.is_ok() {
        assert_eq!(first, tlspl::compile_checked(s, &options));
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run compile_fuzz");
}
