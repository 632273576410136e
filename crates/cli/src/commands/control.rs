//! `parley start|stop|status|log`: drive a running gateway over HTTP.

use parley_bridge::{LogPage, StartRequest, StatusReport};
use parley_core::Exchange;
use std::path::Path;
use std::time::Duration;

use super::client::GatewayClient;
use super::load_config;

fn connect(
    config_path: Option<&Path>,
    gateway: Option<&str>,
) -> Result<GatewayClient, Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    GatewayClient::resolve(gateway, &config)
}

pub async fn start(
    config_path: Option<&Path>,
    gateway: Option<&str>,
    request: StartRequest,
    follow: bool,
    poll_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(config_path, gateway)?;

    println!("Checking services...");
    let service = client.service_status().await?;
    println!("  [OK] Gateway is running at {}", client.base_url());
    println!("  {} Subject at {}", mark(service.subject_reachable), service.subject_url);
    println!(
        "  {} Responder at {}",
        mark(service.responder_reachable),
        service.responder_url
    );
    if !service.subject_reachable || !service.responder_reachable {
        return Err("Both agents must be reachable before a run can start".into());
    }

    let receipt = client.start(&request).await?;
    println!("\nBridge run started at {}", receipt.started_at.to_rfc3339());
    println!("  Exchange limit:  {}", receipt.params.exchange_limit);
    println!("  Delay:           {}s", receipt.params.inter_exchange_delay_seconds);
    println!("  Topic interval:  {}", receipt.params.topic_switch_interval);

    if !follow {
        println!("\nFollow progress with: parley status");
        return Ok(());
    }

    println!("\nMonitoring progress (Ctrl+C to stop watching)...\n");
    let poll = Duration::from_secs(poll_secs.max(1));
    loop {
        tokio::time::sleep(poll).await;
        let status = client.status().await?;
        if status.phase == parley_bridge::Phase::Idle {
            println!("\nRun finished: {} exchanges", status.exchanges_completed);
            if let Some(artifact) = &status.last_artifact {
                println!("  Session log: {artifact}");
            }
            if let Some(err) = &status.last_persist_error {
                println!("  [X] Session log was not saved: {err}");
            }
            break;
        }
        println!(
            "Progress: {}/{} exchanges | Topic: {}",
            status.exchanges_completed,
            status.exchange_limit,
            shorten(&status.current_topic, 50)
        );
    }

    Ok(())
}

pub async fn stop(
    config_path: Option<&Path>,
    gateway: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(config_path, gateway)?;
    let receipt = client.stop().await?;
    println!(
        "Stop requested after {} exchanges. The run will end after its current step.",
        receipt.exchanges_completed
    );
    Ok(())
}

pub async fn status(
    config_path: Option<&Path>,
    gateway: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(config_path, gateway)?;
    let status = client.status().await?;
    print!("{}", render_status(&status));
    Ok(())
}

pub async fn log(
    config_path: Option<&Path>,
    gateway: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(config_path, gateway)?;
    let page = client.log(limit).await?;
    print!("{}", render_log(&page));
    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok { "[OK]" } else { "[X]" }
}

fn shorten(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn render_status(status: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str("Parley Bridge Status\n");
    out.push_str("====================\n");
    out.push_str(&format!("  Phase:          {}\n", status.phase));
    out.push_str(&format!(
        "  Exchanges:      {}/{}\n",
        status.exchanges_completed, status.exchange_limit
    ));
    let topic = if status.current_topic.is_empty() {
        "(opening)".to_string()
    } else {
        shorten(&status.current_topic, 60)
    };
    out.push_str(&format!("  Topic:          {topic}\n"));
    out.push_str(&format!(
        "  On this topic:  {}/{}\n",
        status.messages_on_current_topic, status.topic_switch_interval
    ));
    match status.started_at {
        Some(at) => out.push_str(&format!("  Started:        {}\n", at.to_rfc3339())),
        None => out.push_str("  Started:        never\n"),
    }
    out.push_str(&format!(
        "  Subject:        {}\n",
        if status.subject_reachable { "reachable" } else { "unreachable" }
    ));
    out.push_str(&format!(
        "  Responder:      {}\n",
        if status.responder_reachable { "reachable" } else { "unreachable" }
    ));
    if let Some(artifact) = &status.last_artifact {
        out.push_str(&format!("  Last log:       {artifact}\n"));
    }
    if let Some(err) = &status.last_persist_error {
        out.push_str(&format!("  Save failed:    {err}\n"));
    }
    out
}

fn render_exchange(n: usize, exchange: &Exchange) -> String {
    let mut out = format!(
        "[{n}] {}\n  → {}\n  ← {}\n",
        exchange.timestamp.format("%H:%M:%S"),
        exchange.outbound_to_subject,
        exchange.subject_reply
    );
    if !exchange.auxiliary_metrics.is_empty() {
        let metrics: Vec<String> = exchange
            .auxiliary_metrics
            .iter()
            .map(|(name, value)| format!("{name}={value:.2}"))
            .collect();
        out.push_str(&format!("  metrics: {}\n", metrics.join(", ")));
    }
    out
}

fn render_log(page: &LogPage) -> String {
    if page.exchanges.is_empty() {
        return "No exchanges recorded yet.\n".to_string();
    }

    let first = page.total_exchanges - page.returned_count + 1;
    let mut out = format!(
        "Showing {} of {} exchanges\n\n",
        page.returned_count, page.total_exchanges
    );
    for (offset, exchange) in page.exchanges.iter().enumerate() {
        out.push_str(&render_exchange(first + offset, exchange));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_bridge::Phase;
    use parley_core::Metrics;

    fn idle_status() -> StatusReport {
        StatusReport {
            running: false,
            phase: Phase::Idle,
            exchanges_completed: 3,
            exchange_limit: 100,
            current_topic: String::new(),
            topic_index: 0,
            messages_on_current_topic: 3,
            topic_switch_interval: 10,
            inter_exchange_delay_seconds: 2.0,
            started_at: None,
            subject_reachable: true,
            responder_reachable: false,
            last_artifact: Some("training_logs/session_x.json".into()),
            last_persist_error: None,
        }
    }

    #[test]
    fn status_rendering() {
        let text = render_status(&idle_status());
        assert!(text.contains("Phase:          idle"));
        assert!(text.contains("3/100"));
        assert!(text.contains("(opening)"));
        assert!(text.contains("Responder:      unreachable"));
        assert!(text.contains("session_x.json"));
    }

    #[test]
    fn log_numbers_exchanges_from_total() {
        let mut metrics = Metrics::new();
        metrics.insert("joy".into(), 0.5);
        let exchange = Exchange {
            timestamp: Utc::now(),
            outbound_to_subject: "hello".into(),
            subject_reply: "hi".into(),
            auxiliary_metrics: metrics,
        };
        let page = LogPage {
            total_exchanges: 7,
            returned_count: 1,
            exchanges: vec![exchange],
        };

        let text = render_log(&page);
        assert!(text.contains("Showing 1 of 7"));
        assert!(text.contains("[7]"));
        assert!(text.contains("→ hello"));
        assert!(text.contains("joy=0.50"));
    }

    #[test]
    fn empty_log() {
        let page = LogPage {
            total_exchanges: 0,
            returned_count: 0,
            exchanges: vec![],
        };
        assert_eq!(render_log(&page), "No exchanges recorded yet.\n");
    }

    #[test]
    fn shorten_long_topic() {
        assert_eq!(shorten("abcdef", 3), "abc...");
        assert_eq!(shorten("abc", 3), "abc");
    }
}
