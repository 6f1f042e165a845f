/// Build provenance reported by `lc3serial version --extended`.
const PROVENANCE: [(&str, &str); 2] = [
    ("TARGET", "LC3SERIAL_BUILD_TARGET"),
    ("PROFILE", "LC3SERIAL_BUILD_PROFILE"),
];

fn main() {
    for (cargo_var, exported) in PROVENANCE {
        let value = std::env::var(cargo_var).unwrap_or_else(|_| "unknown".to_string());
        println!("cargo:rustc-env={exported}={value}");
        println!("cargo:rerun-if-env-changed={cargo_var}");
    }
}
