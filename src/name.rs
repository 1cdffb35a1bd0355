use std::fmt;

/// Name of an application process endpoint
///
/// An endpoint is identified by an application process name (APN) and an
/// application process instance (API). Both parts are optional; an entirely
/// unset name means "let the fabric decide" (e.g. no intermediate process
/// pinned). Names are immutable once built.
///
/// # Examples
///
/// ```
/// use flowrr::name::EndpointName;
///
/// let name = EndpointName::new(Some("rlite_rr-data"), Some("server"));
/// assert_eq!(name.to_string(), "rlite_rr-data/server");
/// assert!(name.is_set());
/// assert!(!EndpointName::unset().is_set());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EndpointName {
    apn: Option<String>,
    api: Option<String>,
}

impl EndpointName {
    pub fn new(apn: Option<impl Into<String>>, api: Option<impl Into<String>>) -> Self {
        Self {
            apn: apn.map(Into::into),
            api: api.map(Into::into),
        }
    }

    /// A name with neither part filled in
    pub fn unset() -> Self {
        Self::default()
    }

    /// True when at least the process name is filled in
    pub fn is_set(&self) -> bool {
        self.apn.is_some()
    }

    pub fn apn(&self) -> Option<&str> {
        self.apn.as_deref()
    }

    pub fn api(&self) -> Option<&str> {
        self.api.as_deref()
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.apn, &self.api) {
            (Some(apn), Some(api)) => write!(f, "{apn}/{api}"),
            (Some(apn), None) => write!(f, "{apn}"),
            _ => write!(f, "-"),
        }
    }
}

/// Requested quality-of-service class for a flow, identified by cube name
///
/// The flow specification is supplied at allocation time only and is opaque
/// to this tool; the fabric interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSpec {
    cube: String,
}

impl FlowSpec {
    pub const DEFAULT_CUBE: &'static str = "unreliable best-effort";

    pub fn new(cube: impl Into<String>) -> Self {
        Self { cube: cube.into() }
    }

    pub fn cube(&self) -> &str {
        &self.cube
    }
}

impl Default for FlowSpec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CUBE)
    }
}

impl fmt::Display for FlowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cube)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_both_parts() {
        let name = EndpointName::new(Some("rlite_rr-data"), Some("client"));
        assert_eq!(name.to_string(), "rlite_rr-data/client");
    }

    #[test]
    fn display_renders_apn_only() {
        let name = EndpointName::new(Some("probe"), None::<String>);
        assert_eq!(name.to_string(), "probe");
    }

    #[test]
    fn unset_name_renders_placeholder() {
        assert_eq!(EndpointName::unset().to_string(), "-");
        assert!(!EndpointName::unset().is_set());
    }

    #[test]
    fn api_alone_does_not_make_a_name_set() {
        let name = EndpointName::new(None::<String>, Some("1"));
        assert!(!name.is_set());
    }

    #[test]
    fn default_flow_spec_is_best_effort() {
        assert_eq!(FlowSpec::default().cube(), "unreliable best-effort");
    }
}
