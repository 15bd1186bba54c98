//! Package metadata generated by `build.rs` from `Cargo.toml`.

include!(concat!(env!("OUT_DIR"), "/pkg_info.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_values_match_the_manifest() {
        assert_eq!(PKG_NAME, env!("CARGO_PKG_NAME"));
        assert_eq!(PKG_VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(PKG_DESCRIPTION, env!("CARGO_PKG_DESCRIPTION"));
    }
}
