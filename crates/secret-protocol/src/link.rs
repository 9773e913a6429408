//! Shareable links: `<base>/s/<id>#key=<hex>`

use url::Url;

use crate::{KEY_FRAGMENT_PARAM, ProtocolError, ProtocolResult, SHARE_PATH_PREFIX, ShareId, ShareKey};

/// A share location plus the key that decrypts it.
///
/// `resource` never carries a fragment, so it is safe to hand to an HTTP
/// client. The key is only rendered by [`ShareLink::shareable_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    resource: Url,
    key: ShareKey,
}

impl ShareLink {
    /// Build the link a sender hands out for `id` under `public_base`
    pub fn build(public_base: &Url, id: &ShareId, key: ShareKey) -> ProtocolResult<Self> {
        let base = public_base.as_str().trim_end_matches('/');
        let resource = Url::parse(&format!("{}{}{}", base, SHARE_PATH_PREFIX, id))
            .map_err(|e| ProtocolError::InvalidUrl(e.to_string()))?;
        Ok(Self { resource, key })
    }

    /// Parse a full link as received out-of-band.
    ///
    /// The key is read from the fragment locally; query and fragment are
    /// stripped from the resource.
    pub fn parse(link: &str) -> ProtocolResult<Self> {
        let mut url =
            Url::parse(link.trim()).map_err(|e| ProtocolError::InvalidUrl(e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProtocolError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let fragment = url.fragment().ok_or(ProtocolError::MissingKey)?;
        let key_hex = url::form_urlencoded::parse(fragment.as_bytes())
            .find(|(name, _)| name == KEY_FRAGMENT_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or(ProtocolError::MissingKey)?;
        let key = ShareKey::from_hex(&key_hex)?;

        url.set_fragment(None);
        url.set_query(None);

        Ok(Self { resource: url, key })
    }

    /// The full URL including `#key=...`, to be shared out-of-band
    pub fn shareable_url(&self) -> String {
        format!("{}#{}={}", self.resource, KEY_FRAGMENT_PARAM, self.key.to_hex())
    }

    /// Share location without the key (`<base>/s/<id>`)
    pub fn resource_url(&self) -> &Url {
        &self.resource
    }

    pub fn meta_url(&self) -> Url {
        self.sub_resource("meta")
    }

    pub fn blob_url(&self) -> Url {
        self.sub_resource("blob")
    }

    pub fn key(&self) -> &ShareKey {
        &self.key
    }

    fn sub_resource(&self, name: &str) -> Url {
        let mut url = self.resource.clone();
        let path = format!("{}/{}", self.resource.path().trim_end_matches('/'), name);
        url.set_path(&path);
        url
    }
}
