//! Store key layout.
//!
//! Segment usage records live at `/{app}/{component}/{segment}` and instance
//! records at `/{app}/{component}/{instance}`. Segments are CIDR strings, so a
//! segment key contains the prefix length after a second slash, e.g.
//! `/zhongcni/ipam/10.240.0.0/24`.

pub const DEFAULT_APP: &str = "zhongcni";
pub const DEFAULT_COMPONENT: &str = "ipam";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    app: String,
    component: String,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_APP, DEFAULT_COMPONENT)
    }
}

impl Keyspace {
    pub fn new(app: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            component: component.into(),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Key of the usage record for `segment`.
    pub fn segment_key(&self, segment: &str) -> String {
        format!("/{}/{}/{}", self.app, self.component, segment)
    }

    /// Key reserved for the per-instance record. Nothing writes it yet.
    pub fn instance_key(&self, instance: &str) -> String {
        format!("/{}/{}/{}", self.app, self.component, instance)
    }

    /// Prefix covering every key of this application.
    pub fn app_prefix(&self) -> String {
        format!("/{}/", self.app)
    }

    /// Prefix covering every key of this component.
    pub fn component_prefix(&self) -> String {
        format!("/{}/{}/", self.app, self.component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_key_layout() {
        let ks = Keyspace::default();
        assert_eq!(ks.segment_key("10.240.0.0/24"), "/zhongcni/ipam/10.240.0.0/24");
    }

    #[test]
    fn test_instance_key_layout() {
        let ks = Keyspace::new("rkcni", "addr");
        assert_eq!(ks.instance_key("pod-a"), "/rkcni/addr/pod-a");
        assert!(ks.instance_key("pod-a").starts_with(&ks.component_prefix()));
        assert!(ks.component_prefix().starts_with(&ks.app_prefix()));
    }
}
