//! Integration tests for sccache-ci

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn sccache_ci() -> Command {
        cargo_bin_cmd!("sccache-ci")
    }

    #[test]
    fn help_displays() {
        sccache_ci()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("sccache on CI runners"));
    }

    #[test]
    fn version_displays() {
        sccache_ci()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("sccache-ci"));
    }

    #[test]
    fn setup_help_lists_inputs() {
        sccache_ci()
            .args(["setup", "--help"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("--sccache-version")
                    .and(predicate::str::contains("--local"))
                    .and(predicate::str::contains("--lockfile")),
            );
    }

    #[test]
    fn stats_without_installed_tool_fails() {
        sccache_ci()
            .arg("stats")
            .env_remove("SCCACHE_PATH")
            .env_remove("SCCACHE_CI_DISABLE_ANNOTATIONS")
            .assert()
            .failure()
            .stderr(predicate::str::contains("SCCACHE_PATH"));
    }

    #[test]
    fn stats_disabled_is_a_no_op() {
        sccache_ci()
            .args(["stats", "--disable-annotations"])
            .env_remove("SCCACHE_PATH")
            .assert()
            .success();
    }

    #[test]
    fn post_without_cache_flag_skips_cache_steps() {
        // No stats, no cache work: the permissive path end to end
        sccache_ci()
            .args(["post", "--disable-annotations"])
            .env_remove("SCCACHE_PATH")
            .env_remove("SCCACHE_CI_LOCAL")
            .assert()
            .success();
    }

    #[test]
    fn unknown_subcommand_fails() {
        sccache_ci().arg("frobnicate").assert().failure();
    }
}
