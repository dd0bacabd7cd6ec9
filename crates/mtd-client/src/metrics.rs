//! Client-side counters
//!
//! - `mtd_client_calls_total` (counter): label `status`
//! - `mtd_client_token_refresh_total` (counter): label `result`
//!
//! Without an installed recorder these are no-ops, so library users who do
//! not care about metrics pay nothing.

use crate::outcome::CallStatus;

/// Record a finished logical call by its final status.
pub fn record_call(status: CallStatus) {
    metrics::counter!("mtd_client_calls_total", "status" => status.label()).increment(1);
}

/// Record a refresh exchange attempted by the executor.
pub fn record_refresh(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("mtd_client_token_refresh_total", "result" => result).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_call(CallStatus::Success);
        record_refresh(false);
    }

    #[test]
    fn record_call_labels_status() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_call(CallStatus::Success);
        record_call(CallStatus::SuccessWithRotatedCredentials);
        record_call(CallStatus::Error);

        let output = handle.render();
        assert!(output.contains("mtd_client_calls_total"));
        assert!(output.contains("status=\"success\""));
        assert!(output.contains("status=\"success_with_rotated_credentials\""));
        assert!(output.contains("status=\"error\""));
    }

    #[test]
    fn record_refresh_labels_result() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_refresh(true);
        record_refresh(false);

        let output = handle.render();
        assert!(output.contains("mtd_client_token_refresh_total"));
        assert!(output.contains("result=\"success\""));
        assert!(output.contains("result=\"failure\""));
    }
}
