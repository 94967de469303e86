//! Configuration types shared between runexp crates.

mod fixtures;
mod harness;

pub use fixtures::*;
pub use harness::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_defaults() {
        let train = TrainStandIn::default();
        assert_eq!(train.gpu, 1);
        assert_eq!(train.batch_size, 32);

        let probe = ProbeConfig::default();
        assert_eq!(probe.seconds, 30);
        assert_eq!(probe.progress_every, 5);
        assert_eq!(probe.gpu, None);

        let inspect = InspectConfig::default();
        assert_eq!(
            inspect.path,
            std::path::PathBuf::from("test_concurrent_fail.csv")
        );
    }

    #[test]
    fn test_harness_settings_defaults() {
        let settings = HarnessSettings::default();
        assert_eq!(settings.output, "results.csv");
        assert_eq!(settings.concurrency, 1);
        assert!(settings.metrics.is_empty());
        assert!(!settings.preserve_output);
        assert_eq!(settings.stream, OutputStream::Both);
        assert_eq!(settings.timeout_secs, None);
    }

    #[test]
    fn test_harness_settings_partial_toml() {
        let settings: HarnessSettings = toml::from_str(
            r#"
concurrency = 4
metrics = ["accuracy", "loss"]
stream = "stdout"
"#,
        )
        .unwrap();
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.metrics, vec!["accuracy", "loss"]);
        assert_eq!(settings.stream, OutputStream::Stdout);
        // Untouched fields keep their defaults
        assert_eq!(settings.output, "results.csv");
    }

    #[test]
    fn test_output_columns() {
        assert_eq!(OutputStream::Both.columns(), &["stdout", "stderr"]);
        assert_eq!(OutputStream::Stdout.columns(), &["stdout"]);
        assert_eq!(OutputStream::Stderr.columns(), &["stderr"]);
    }
}
