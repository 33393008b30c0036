// crates/engine/build.rs
fn main() {
    let f = |n| std::env::var(format!("CARGO_FEATURE_{}", n)).is_ok();

    if f("HTTP_URLS") && std::env::var("PROFILE").map(|p| p == "release").unwrap_or(false) {
        println!("cargo:warning=feature 'http_urls' permits plain HTTP timestamp/LPA endpoints in a release build");
    }
}
