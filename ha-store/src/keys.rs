use ha_proto::NodeRole;

pub const ROOT: &str = "/ha";
pub const CONFIGURATION_KEY: &str = "/ha/configuration";

pub fn node_key(name: &str) -> String {
    format!("{ROOT}/{name}")
}

pub fn node_prefix(name: &str) -> String {
    format!("{ROOT}/{name}/")
}

pub fn service_key(node_name: &str, role: NodeRole, service_name: &str) -> String {
    format!("{ROOT}/{node_name}/{}/{service_name}", role_label(role))
}

pub fn service_prefix(node_name: &str, role: NodeRole) -> String {
    format!("{ROOT}/{node_name}/{}/", role_label(role))
}

pub fn role_label(role: NodeRole) -> &'static str {
    match role {
        NodeRole::Master => "master",
        NodeRole::Slave => "slave",
        NodeRole::Zookeeper => "zookeeper",
    }
}
