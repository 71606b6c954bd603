pub struct Config {
    pub perf_csv_path: &'static str,
    pub models_path: &'static str,
    pub shell_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            perf_csv_path: "perf.csv",
            models_path: "models.json",
            shell_timeout_secs: 60,
        }
    }
}
