//! Backend URL construction from stored host/port settings.

use crate::storage::BackendConfig;

/// Build the normalised base URL (always ending in `/`).
///
/// - a missing scheme defaults to `http://`
/// - the stored port is appended when the host does not already carry one
#[must_use]
pub fn base_url(config: &BackendConfig) -> String {
    let mut url = config.host.trim().trim_end_matches('/').to_owned();
    if !url.contains("://") {
        url = format!("http://{url}");
    }

    if let Some(port) = config.port {
        let authority = url
            .split_once("://")
            .map(|(_, rest)| rest.split('/').next().unwrap_or(rest))
            .unwrap_or_default();
        if !authority.contains(':') {
            match url.split_once("://") {
                Some((scheme, rest)) => {
                    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
                    url = if path.is_empty() {
                        format!("{scheme}://{host}:{port}")
                    } else {
                        format!("{scheme}://{host}:{port}/{path}")
                    };
                }
                None => url = format!("{url}:{port}"),
            }
        }
    }

    url.push('/');
    url
}
