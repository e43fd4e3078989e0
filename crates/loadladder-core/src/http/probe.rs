use crate::config::LadderConfig;

/// Check whether the target API answers before any load is generated.
///
/// Sends a single GET to the first configured endpoint using the probe
/// timeout, and returns `true` only for a 200 response. Failures are logged
/// and reported as `false`; they never abort the run.
pub async fn probe_availability(config: &LadderConfig) -> bool {
    let Some(endpoint) = config.endpoints.first() else {
        tracing::warn!("no endpoints configured, skipping availability check");
        return false;
    };
    let url = format!("{}{}", config.base_url(), endpoint);

    let client = match reqwest::Client::builder()
        .timeout(config.probe_timeout())
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("failed to build probe client: {e}");
            return false;
        }
    };

    match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if status != 200 {
                tracing::warn!(%url, status, "API check returned non-200 status");
            }
            status == 200
        }
        Err(e) => {
            tracing::warn!(%url, "API check failed: {e}");
            false
        }
    }
}
