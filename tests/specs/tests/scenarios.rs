//! End-to-end scenario tests that spawn the real `ids-server` binary and
//! drive it over HTTP ingest and WebSocket tail, matching the six
//! illustrative walkthroughs for the detection pipeline.

use std::time::Duration;

use futures_util::StreamExt;
use ids_specs::IdsServerProcess;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(10);

const SSH_BRUTEFORCE: &str = r#"
id: ssh-bruteforce
name: SSH brute force
title: Repeated SSH login attempts from a single source
desc: Five or more SSH attempts from the same source IP against the same host within one minute.
why: A burst of rapid SSH attempts from one source looks automated.
advice: Block the source IP.
enabled: true
log_source: ssh
require: [src_ip]
group_by: [src_ip, host]
window_sec: 60
threshold: 5
cooldown_sec: 300
dedup_key: "{rule_id}:{src_ip}"
severity: high
tags: [auth, bruteforce, ssh]
"#;

const SSH_USERNAME_SPRAY: &str = r#"
id: ssh-username-spray
name: SSH username spray
title: Many distinct usernames tried from one source
desc: Five or more distinct usernames attempted from the same source IP within two minutes.
why: Distinguishes password spray from classic brute force.
advice: Block the source IP.
enabled: true
log_source: ssh
require: [src_ip, username]
match:
  outcome: fail
group_by: [src_ip]
distinct_on: [username]
window_sec: 120
threshold: 5
cooldown_sec: 300
dedup_key: "{rule_id}:{src_ip}"
severity: high
tags: [auth, bruteforce, spray, ssh]
"#;

const HTTP_PATH_BRUTEFORCE: &str = r#"
id: http-path-bruteforce
name: HTTP path brute force
title: Repeated 404s against sensitive-looking paths from one source
desc: Five or more HTTP 404 responses to the same source IP within 30 seconds.
why: A burst of 404s in a short window looks like a content-discovery scanner.
advice: Block the source IP.
enabled: true
log_source: http
match:
  status_code: "404"
group_by: [src_ip]
window_sec: 30
threshold: 5
cooldown_sec: 300
dedup_key: "{rule_id}:{src_ip}"
severity: medium
tags: [recon, http, scanning]
"#;

const SSH_FAIL_THEN_SUCCESS: &str = r#"
id: ssh-fail-then-success
name: SSH failures followed by success
title: A burst of failed SSH logins immediately followed by a successful one
desc: Five or more failed SSH logins for a (source IP, username) pair within five minutes, followed by a success within sixty seconds.
why: A successful login right after a burst of failures looks like a guessed credential.
advice: Treat the account as compromised.
enabled: true
log_source: ssh
require: [src_ip, username]
group_by: [src_ip, username]
sequence:
  fail_count: 5
  fail_within_sec: 300
  success_within_sec: 60
cooldown_sec: 600
dedup_key: "{rule_id}:{src_ip}:{username}"
severity: critical
tags: [auth, bruteforce, sequence, ssh]
"#;

async fn next_alert(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
) -> anyhow::Result<serde_json::Value> {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => anyhow::bail!("unexpected ws message: {other:?}"),
        };
        let parsed: serde_json::Value = serde_json::from_str(&text)?;
        match parsed["type"].as_str() {
            Some("alert") => return Ok(parsed),
            Some("ping") | Some("status") => continue,
            other => anyhow::bail!("unexpected message type: {other:?}"),
        }
    }
}

// S1: five SSH attempts from one source against one host inside the window
// trip exactly one alert for the fifth event.
#[tokio::test]
async fn s1_ssh_bruteforce_window_trips_on_threshold() -> anyhow::Result<()> {
    let server = IdsServerProcess::start_with_rules(&[("ssh-bruteforce", SSH_BRUTEFORCE)])?;
    server.wait_healthy(TIMEOUT).await?;

    for n in 1..=4 {
        let resp = server
            .ingest_debug("ssh", &format!("Failed password for root from 10.0.0.9 port 22 ssh2 attempt {n}"))
            .await?;
        assert!(resp["alert_ids"].as_array().map(|a| a.is_empty()).unwrap_or(true));
    }

    let resp = server
        .ingest_debug("ssh", "Failed password for root from 10.0.0.9 port 22 ssh2 attempt 5")
        .await?;
    let alert_ids = resp["alert_ids"].as_array().expect("alert_ids array");
    assert_eq!(alert_ids.len(), 1);

    Ok(())
}

// S2: five distinct usernames from one source within the window trip the
// spray rule even though no single username repeats.
#[tokio::test]
async fn s2_username_spray_counts_distinct_values() -> anyhow::Result<()> {
    let server = IdsServerProcess::start_with_rules(&[("ssh-username-spray", SSH_USERNAME_SPRAY)])?;
    server.wait_healthy(TIMEOUT).await?;

    for user in ["alice", "bob", "carol", "dave"] {
        let resp = server
            .ingest_debug("ssh", &format!("Failed password for {user} from 10.0.0.7 port 22 ssh2"))
            .await?;
        assert!(resp["alert_ids"].as_array().map(|a| a.is_empty()).unwrap_or(true));
    }

    let resp = server
        .ingest_debug("ssh", "Failed password for erin from 10.0.0.7 port 22 ssh2")
        .await?;
    let alert_ids = resp["alert_ids"].as_array().expect("alert_ids array");
    assert_eq!(alert_ids.len(), 1);

    Ok(())
}

// S3: five 404s from one source within the window trip the path-scanning rule.
#[tokio::test]
async fn s3_http_path_bruteforce_on_repeated_404s() -> anyhow::Result<()> {
    let server = IdsServerProcess::start_with_rules(&[("http-path-bruteforce", HTTP_PATH_BRUTEFORCE)])?;
    server.wait_healthy(TIMEOUT).await?;

    for path in ["/admin", "/backup.zip", "/.git/config", "/wp-login.php"] {
        let resp = server
            .ingest_debug("http", &format!("GET {path} HTTP/1.1 from 203.0.113.5 status=404"))
            .await?;
        assert!(resp["alert_ids"].as_array().map(|a| a.is_empty()).unwrap_or(true));
    }

    let resp = server
        .ingest_debug("http", "GET /phpmyadmin HTTP/1.1 from 203.0.113.5 status=404")
        .await?;
    let alert_ids = resp["alert_ids"].as_array().expect("alert_ids array");
    assert_eq!(alert_ids.len(), 1);

    Ok(())
}

// S4: a burst of five failures followed by a success for the same
// (src_ip, username) pair trips the sequence rule on the success event, not
// on any of the failures.
#[tokio::test]
async fn s4_fail_then_success_sequence_fires_on_success() -> anyhow::Result<()> {
    let server = IdsServerProcess::start_with_rules(&[("ssh-fail-then-success", SSH_FAIL_THEN_SUCCESS)])?;
    server.wait_healthy(TIMEOUT).await?;

    for _ in 0..5 {
        let resp = server
            .ingest_debug("ssh", "Failed password for root from 198.51.100.4 port 22 ssh2")
            .await?;
        assert!(resp["alert_ids"].as_array().map(|a| a.is_empty()).unwrap_or(true));
    }

    let resp = server
        .ingest_debug("ssh", "Accepted password for root from 198.51.100.4 port 22 ssh2")
        .await?;
    let alert_ids = resp["alert_ids"].as_array().expect("alert_ids array");
    assert_eq!(alert_ids.len(), 1);

    Ok(())
}

// S5: once a rule has fired, repeating the same trigger inside the cooldown
// window must not fire a second alert.
#[tokio::test]
async fn s5_cooldown_suppresses_repeat_alerts() -> anyhow::Result<()> {
    let server = IdsServerProcess::start_with_rules(&[("ssh-bruteforce", SSH_BRUTEFORCE)])?;
    server.wait_healthy(TIMEOUT).await?;

    for n in 1..=5 {
        server
            .ingest_debug("ssh", &format!("Failed password for root from 172.16.0.3 port 22 ssh2 attempt {n}"))
            .await?;
    }

    let resp = server
        .ingest_debug("ssh", "Failed password for root from 172.16.0.3 port 22 ssh2 attempt 6")
        .await?;
    assert!(resp["alert_ids"].as_array().map(|a| a.is_empty()).unwrap_or(true));

    Ok(())
}

// S6: a subscriber connecting to the live alert feed only observes alerts
// raised after it connects; the cursor starts at "now", not at the
// beginning of the stream.
#[tokio::test]
async fn s6_subscriber_cursor_starts_at_connect_time() -> anyhow::Result<()> {
    let server = IdsServerProcess::start_with_rules(&[("ssh-bruteforce", SSH_BRUTEFORCE)])?;
    server.wait_healthy(TIMEOUT).await?;

    for n in 1..=5 {
        server
            .ingest_debug("ssh", &format!("Failed password for root from 203.0.113.77 port 22 ssh2 attempt {n}"))
            .await?;
    }

    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url("alerts")).await?;

    server
        .ingest_debug("ssh", "Failed password for root from 198.18.0.44 port 22 ssh2 attempt 1")
        .await?;
    for n in 2..=5 {
        server
            .ingest_debug("ssh", &format!("Failed password for root from 198.18.0.44 port 22 ssh2 attempt {n}"))
            .await?;
    }

    let alert = next_alert(&mut ws).await?;
    let src_ip = alert["data"]["src_ip"].as_str().unwrap_or_default();
    assert_eq!(src_ip, "198.18.0.44");

    Ok(())
}
