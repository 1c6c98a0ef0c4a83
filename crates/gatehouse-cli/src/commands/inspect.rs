use gatehouse_api::RouteSetName;
use gatehouse_core::GateConfig;

use crate::pout;

pub fn cmd_routes(config: &GateConfig, json: bool) -> anyhow::Result<()> {
    let table = config.route_table()?;

    let mut value = serde_json::Map::new();
    let mut text = String::new();
    for set in RouteSetName::ALL {
        let patterns = table.matcher(set).patterns();
        value.insert(set.as_str().to_string(), serde_json::json!(patterns));
        let listed = if patterns.is_empty() {
            "(none)".to_string()
        } else {
            patterns.join(", ")
        };
        text.push_str(&format!("{:<14} {listed}\n", set.as_str()));
    }

    value.insert(
        "redirects".to_string(),
        serde_json::json!({
            "sign_in": config.redirects.sign_in,
            "dashboard": config.redirects.dashboard,
            "after_login": config.redirects.after_login,
        }),
    );
    text.push_str(&format!(
        "sign-in -> {}, dashboard -> {}",
        config.redirects.sign_in, config.redirects.dashboard
    ));

    pout(json, serde_json::Value::Object(value), &text)
}

pub fn cmd_check(config: &GateConfig, path: &str, json: bool) -> anyhow::Result<()> {
    let matched = matched_sets(config, path)?;
    let text = if matched.is_empty() {
        format!("{path}: public")
    } else {
        format!("{path}: {}", matched.join(", "))
    };
    pout(
        json,
        serde_json::json!({ "path": path, "sets": matched }),
        &text,
    )
}

fn matched_sets(config: &GateConfig, path: &str) -> anyhow::Result<Vec<&'static str>> {
    let class = config.route_table()?.classify(path);
    Ok(class.matched().into_iter().map(RouteSetName::as_str).collect())
}
