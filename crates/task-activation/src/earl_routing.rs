use archon_types::AgentId;
use std::collections::HashMap;

/// Domain → Earl routing table with an explicit default fallback (§4.9).
/// Unknown domains never fail to route; they fall through to the default.
pub struct EarlRoutingTable {
    routes: HashMap<String, AgentId>,
    default_fallback: AgentId,
}

impl EarlRoutingTable {
    pub fn new(default_fallback: AgentId) -> Self {
        Self {
            routes: HashMap::new(),
            default_fallback,
        }
    }

    pub fn register(&mut self, domain: impl Into<String>, earl: AgentId) {
        self.routes.insert(domain.into(), earl);
    }

    pub fn route(&self, domain: &str) -> AgentId {
        self.routes.get(domain).cloned().unwrap_or_else(|| self.default_fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_domain_falls_back_to_default() {
        let fallback = AgentId::system("earl-default");
        let mut table = EarlRoutingTable::new(fallback.clone());
        table.register("infrastructure", AgentId::system("earl-infra"));
        assert_eq!(table.route("unknown-domain"), fallback);
    }

    #[test]
    fn registered_domain_routes_to_its_earl() {
        let mut table = EarlRoutingTable::new(AgentId::system("earl-default"));
        table.register("infrastructure", AgentId::system("earl-infra"));
        assert_eq!(table.route("infrastructure"), AgentId::system("earl-infra"));
    }
}
