//! Document addressing: workspace types and strict URL parsing.

use armature_model::validate_id;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// The three workspace flavors a document element can be addressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceType {
    /// A live workspace (`w`).
    #[serde(rename = "w")]
    Workspace,
    /// An immutable version (`v`).
    #[serde(rename = "v")]
    Version,
    /// A microversion (`m`).
    #[serde(rename = "m")]
    Microversion,
}

impl WorkspaceType {
    /// The single-letter URL segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceType::Workspace => "w",
            WorkspaceType::Version => "v",
            WorkspaceType::Microversion => "m",
        }
    }

    /// Parse the single-letter URL segment.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "w" => Some(WorkspaceType::Workspace),
            "v" => Some(WorkspaceType::Version),
            "m" => Some(WorkspaceType::Microversion),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkspaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-addressed document element:
/// `https://<host>/documents/{did}/{w|v|m}/{wid}/e/{eid}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Scheme + host, e.g. `https://cad.example.com`.
    pub base_url: String,
    /// Document id (24 chars).
    pub did: String,
    /// Workspace flavor.
    pub wtype: WorkspaceType,
    /// Workspace / version / microversion id (24 chars).
    pub wid: String,
    /// Element id (24 chars).
    pub eid: String,
}

impl Document {
    /// Parse a document URL. All three ids must be exactly 24 characters
    /// and the workspace-type segment one of `w`, `v`, `m`.
    pub fn from_url(url: &str) -> Result<Self> {
        let invalid = || ClientError::InvalidUrl(url.to_owned());

        let (base_url, rest) = url.split_once("/documents/").ok_or_else(invalid)?;
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(invalid());
        }

        let mut segments = rest.trim_end_matches('/').split('/');
        let did = segments.next().ok_or_else(invalid)?;
        let wtype = segments
            .next()
            .and_then(WorkspaceType::parse)
            .ok_or_else(invalid)?;
        let wid = segments.next().ok_or_else(invalid)?;
        if segments.next() != Some("e") {
            return Err(invalid());
        }
        let eid = segments.next().ok_or_else(invalid)?;
        if segments.next().is_some() {
            return Err(invalid());
        }

        for id in [did, wid, eid] {
            validate_id(id).map_err(|_| invalid())?;
        }

        Ok(Self {
            base_url: base_url.to_owned(),
            did: did.to_owned(),
            wtype,
            wid: wid.to_owned(),
            eid: eid.to_owned(),
        })
    }

    /// Rebuild the canonical URL.
    pub fn url(&self) -> String {
        format!(
            "{}/documents/{}/{}/{}/e/{}",
            self.base_url, self.did, self.wtype, self.wid, self.eid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DID: &str = "a1c1addf75444f54b504f25c";
    const WID: &str = "0d17b8ebb2a4c76be9fff3c7";
    const EID: &str = "a86aaf34d2f4353288df8812";

    #[test]
    fn parses_workspace_url() {
        let url = format!("https://cad.example.com/documents/{DID}/w/{WID}/e/{EID}");
        let doc = Document::from_url(&url).unwrap();
        assert_eq!(doc.base_url, "https://cad.example.com");
        assert_eq!(doc.wtype, WorkspaceType::Workspace);
        assert_eq!(doc.url(), url);
    }

    #[test]
    fn parses_version_and_microversion() {
        for (letter, wtype) in [
            ("v", WorkspaceType::Version),
            ("m", WorkspaceType::Microversion),
        ] {
            let url = format!("https://cad.example.com/documents/{DID}/{letter}/{WID}/e/{EID}");
            assert_eq!(Document::from_url(&url).unwrap().wtype, wtype);
        }
    }

    #[test]
    fn rejects_malformed_urls() {
        let bad = [
            format!("https://cad.example.com/documents/{DID}/x/{WID}/e/{EID}"),
            format!("https://cad.example.com/documents/short/w/{WID}/e/{EID}"),
            format!("https://cad.example.com/documents/{DID}/w/{WID}/{EID}"),
            format!("ftp://cad.example.com/documents/{DID}/w/{WID}/e/{EID}"),
            format!("https://cad.example.com/docs/{DID}/w/{WID}/e/{EID}"),
            format!("https://cad.example.com/documents/{DID}/w/{WID}/e/{EID}/extra"),
        ];
        for url in bad {
            assert!(
                matches!(Document::from_url(&url), Err(ClientError::InvalidUrl(_))),
                "should reject {url}"
            );
        }
    }
}
