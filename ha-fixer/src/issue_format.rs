//! Issue body/title rendering (§4.3, §6.4). One formatter shared by every
//! issue-raising call site in the workspace — the Fixer's four local/peer
//! cases, plus the Switcher's `switch` issue (§9 supplement from
//! `github.py`) — so the five issue kinds all carry the same identity +
//! problem + remediation shape.

use chrono::Utc;
use ha_proto::{Node, Service};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    ServiceDown,
    ServiceTimeout,
    HealthcheckerError,
    OtherNodeDown,
    Switch,
}

impl IssueKind {
    fn slug(self) -> &'static str {
        match self {
            IssueKind::ServiceDown => "service_down",
            IssueKind::ServiceTimeout => "service_timeout",
            IssueKind::HealthcheckerError => "healthchecker_error",
            IssueKind::OtherNodeDown => "other_node_down",
            IssueKind::Switch => "switch",
        }
    }
}

/// The uniform request spec.md §4.3 describes:
/// `(issuerNode, issueType, affectedNode?, affectedService?) → PostIssue`.
pub struct IssueContext<'a> {
    pub issuer: &'a Node,
    pub kind: IssueKind,
    pub affected_node: Option<&'a Node>,
    pub affected_service: Option<&'a Service>,
}

/// Renders `(title, body)`. The title carries a UTC timestamp and the issue
/// kind slug; the body lists issuer identity, a one-line problem summary,
/// and an actionable remediation block (§6.4).
pub fn render(ctx: &IssueContext<'_>) -> (String, String) {
    let title = format!(
        "[{}] {} on {}",
        Utc::now().to_rfc3339(),
        ctx.kind.slug(),
        ctx.issuer.name
    );

    let mut body = String::new();
    body.push_str(&format!("Reported by: {} ({:?}/{:?})\n", ctx.issuer.name, ctx.issuer.node_type, ctx.issuer.role));
    body.push_str(&format!("Kind: {}\n\n", ctx.kind.slug()));

    match ctx.kind {
        IssueKind::ServiceDown | IssueKind::ServiceTimeout => {
            let svc = ctx.affected_service.expect("service issue requires affected_service");
            let aging = if ctx.kind == IssueKind::ServiceTimeout { " (unresolved past the unnecessary-service timeout)" } else { "" };
            body.push_str(&format!("Problem: service `{}` on `{}` is down{}.\n\n", svc.name, svc.node_name, aging));
            body.push_str("Suggested remediation:\n");
            body.push_str(&format!("  ssh {}\n", ctx.issuer.ip));
            body.push_str(&format!("  sudo systemctl status {}\n", svc.name));
            body.push_str(&format!("  sudo systemctl restart {}\n", svc.name));
        }
        IssueKind::HealthcheckerError => {
            let peer = ctx.affected_node.expect("healthchecker_error requires affected_node");
            body.push_str(&format!(
                "Problem: {} is pingable but its healthchecker agent has stopped heartbeating.\n\n",
                peer.name
            ));
            body.push_str("Suggested remediation:\n");
            body.push_str(&format!("  ssh {}\n", peer.ip));
            body.push_str("  sudo systemctl status ha-healthchecker\n");
            body.push_str("  sudo systemctl restart ha-healthchecker\n");
        }
        IssueKind::OtherNodeDown => {
            let peer = ctx.affected_node.expect("other_node_down requires affected_node");
            body.push_str(&format!("Problem: {} is unreachable and has been marked down.\n\n", peer.name));
            body.push_str("Suggested remediation:\n");
            body.push_str(&format!("  ssh {}\n", peer.ip));
            body.push_str("  # if the host itself is gone, rebuild it:\n");
            body.push_str(&format!("  labkeeper new-slave --node {}\n", peer.name));
        }
        IssueKind::Switch => {
            let old_master = ctx.affected_node.expect("switch issue requires affected_node (the demoted master)");
            body.push_str(&format!(
                "Problem: failover completed. {} was demoted; {} is now master.\n\n",
                old_master.name, ctx.issuer.name
            ));
            body.push_str("Suggested remediation:\n");
            body.push_str(&format!("  labkeeper new-slave --node {}\n", old_master.name));
        }
    }

    (title, body)
}
