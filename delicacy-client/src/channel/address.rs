//! Channel address

use crate::{ClientConfig, ClientError, ClientResult, PathForm};
use reqwest::Url;
use shared::Role;

/// Build the channel URL for `role`.
///
/// With [`PathForm::Query`] the identifier becomes `?identifier=<id>`, with
/// [`PathForm::Path`] it is appended as a path segment. No identifier means
/// plain `/ws/<role>`.
pub fn channel_url(
    config: &ClientConfig,
    role: Role,
    identifier: Option<&str>,
) -> ClientResult<String> {
    let mut url = Url::parse(&config.channel_base_url())
        .map_err(|e| ClientError::Config(format!("invalid channel address: {e}")))?;
    url.set_path(&format!("/ws/{role}"));

    if let Some(id) = identifier.map(str::trim).filter(|id| !id.is_empty()) {
        match config.channel.path_form {
            PathForm::Query => {
                url.query_pairs_mut().append_pair("identifier", id);
            }
            PathForm::Path => {
                url.path_segments_mut()
                    .map_err(|_| ClientError::Config("channel address cannot carry a path".into()))?
                    .push(id);
            }
        }
    }

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelConfig;

    #[test]
    fn test_query_form() {
        let config = ClientConfig::new("10.0.0.5");
        assert_eq!(
            channel_url(&config, Role::Kitchen, None).unwrap(),
            "ws://10.0.0.5:8000/ws/kitchen"
        );
        assert_eq!(
            channel_url(&config, Role::Customer, Some("ORD 7")).unwrap(),
            "ws://10.0.0.5:8000/ws/customer?identifier=ORD+7"
        );
    }

    #[test]
    fn test_path_form_secure() {
        let config = ClientConfig::new("shop.example")
            .with_secure(true)
            .with_channel(ChannelConfig::default().with_path_form(PathForm::Path));
        assert_eq!(
            channel_url(&config, Role::Customer, Some("customer_abc")).unwrap(),
            "wss://shop.example:8000/ws/customer/customer_abc"
        );
    }

    #[test]
    fn test_blank_identifier_ignored() {
        let config = ClientConfig::new("h");
        assert_eq!(
            channel_url(&config, Role::Admin, Some("  ")).unwrap(),
            "ws://h:8000/ws/admin"
        );
    }
}
