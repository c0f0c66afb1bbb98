use cmdkit_kernel::naming::{env_var_name, join_flag};
use proptest::prelude::*;

proptest! {
    #[test]
    fn env_var_name_is_upper_snake(prefix in "[a-z][a-z0-9-]{0,8}", flag in "[a-z][a-z0-9-]{0,16}") {
        let name = env_var_name(&prefix, &flag);
        prop_assert!(!name.contains('-'));
        prop_assert_eq!(name.to_uppercase(), name.clone());
        let expected_prefix = format!("{}_", prefix.to_uppercase().replace('-', "_"));
        prop_assert!(name.starts_with(&expected_prefix));
        prop_assert!(name.ends_with(&flag.to_uppercase().replace('-', "_")));
    }

    #[test]
    fn empty_env_prefix_yields_flag_only(flag in "[a-z][a-z0-9-]{0,16}") {
        prop_assert_eq!(env_var_name("", &flag), flag.to_uppercase().replace('-', "_"));
    }

    #[test]
    fn join_flag_never_has_dangling_separators(
        prefix in "[a-z]{0,6}",
        suffixes in proptest::collection::vec("[a-z]{0,6}", 0..4),
    ) {
        let parts: Vec<&str> = suffixes.iter().map(String::as_str).collect();
        let joined = join_flag(&prefix, &parts);
        prop_assert!(!joined.starts_with('-'));
        prop_assert!(!joined.ends_with('-'));
        prop_assert!(!joined.contains("--"));
    }
}
