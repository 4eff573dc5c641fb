use smsgw_config::{AgentConfig, ServerConfig};

// 环境变量是进程级共享的，相关断言集中在一个测试里串行执行。
#[test]
fn config_from_env() {
    std::env::remove_var("SMSGW_DATABASE_URL");
    std::env::set_var("SMSGW_JWT_SECRET", "secret-1");
    assert!(ServerConfig::from_env().is_err());

    std::env::set_var("SMSGW_DATABASE_URL", "postgresql://localhost/smsgw");
    let config = ServerConfig::from_env().expect("server config");
    assert_eq!(config.http_addr, "127.0.0.1:8080");
    assert_eq!(config.jwt_access_ttl_seconds, 3600);

    std::env::set_var("SMSGW_DEVICE_ID", "agent-lab-1");
    std::env::set_var("SMSGW_BAUD_RATES", "9600, 115200");
    std::env::set_var("SMSGW_HANGUP_WHITELIST", "555,10086");
    std::env::set_var("SMSGW_HANGUP_ENABLED", "off");
    let agent = AgentConfig::from_env().expect("agent config");
    assert_eq!(agent.device_id, "agent-lab-1");
    assert_eq!(agent.baud_rates, vec![9600, 115_200]);
    assert_eq!(agent.hangup.whitelist, vec!["555", "10086"]);
    assert!(!agent.hangup.enabled);

    std::env::set_var("SMSGW_BAUD_RATES", "fast");
    assert!(AgentConfig::from_env().is_err());

    std::env::remove_var("SMSGW_BAUD_RATES");
    let agent = AgentConfig::from_env().expect("agent config");
    assert_eq!(agent.baud_rates, vec![115_200, 9600, 19_200, 38_400, 57_600]);
}
