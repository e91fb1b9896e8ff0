//! Leptos SSR rendering of the Vigil surveillance dashboard.
//!
//! Pure functions of a [`DashboardPageContext`]; every section is always
//! present in the markup and toggled with `aria-hidden` / `data-*` markers.

use chrono::{DateTime, Utc};
use leptos::prelude::*;
use vigil_core::time_ago;
use vigil_dashboard::{
    Alert, AlertStatus, CameraFeed, CameraStatus, DashboardView, HistoryEvent, Notice, ThreatTier,
};


const DASHBOARD_DOCUMENT_STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #f3f4f6; color: #111827; }
[aria-hidden="true"] { display: none; }
#vigil-navbar { display: flex; justify-content: space-between; align-items: center; padding: 0.75rem 1.5rem; background: #111827; color: #f9fafb; }
#vigil-main { max-width: 80rem; margin: 0 auto; padding: 1.5rem; }
#vigil-status-bar { display: flex; justify-content: space-between; font-size: 0.875rem; color: #4b5563; }
#vigil-demo-banner { margin: 1rem 0; padding: 1rem; border: 1px solid #bfdbfe; background: #eff6ff; border-radius: 0.5rem; }
#vigil-content-grid { display: grid; grid-template-columns: 2fr 1fr; gap: 1.5rem; margin: 1.5rem 0; }
#vigil-feed-grid ul { display: grid; grid-template-columns: repeat(auto-fill, minmax(14rem, 1fr)); gap: 1rem; list-style: none; padding: 0; }
.vigil-card { background: #fff; border-radius: 0.5rem; padding: 1rem; box-shadow: 0 1px 2px rgba(0,0,0,0.08); }
[data-threat-tier="critical"] { border-left: 4px solid #dc2626; }
[data-threat-tier="high"] { border-left: 4px solid #ea580c; }
[data-threat-tier="medium"] { border-left: 4px solid #ca8a04; }
[data-threat-tier="low"] { border-left: 4px solid #16a34a; }
#vigil-alert-modal[data-modal-state="open"] { position: fixed; inset: 0; background: rgba(17,24,39,0.6); display: flex; align-items: center; justify-content: center; }
#vigil-toasts { position: fixed; right: 1rem; bottom: 1rem; display: flex; flex-direction: column; gap: 0.5rem; }
form[data-intent] { display: inline; }
"#;

const DASHBOARD_DOCUMENT_SCRIPT: &str = r#"
document.addEventListener("submit", async (event) => {
  const form = event.target;
  if (!form.matches("form[data-intent]")) return;
  event.preventDefault();
  await fetch(form.action, { method: form.dataset.method || "POST" });
});
const refreshDashboard = async () => {
  const response = await fetch(window.location.pathname);
  const html = await response.text();
  const next = new DOMParser().parseFromString(html, "text/html").getElementById("vigil-dashboard");
  const current = document.getElementById("vigil-dashboard");
  if (next && current) current.replaceWith(next);
};
new EventSource("/api/view/stream").addEventListener("view", refreshDashboard);
"#;

#[derive(Debug, Clone, PartialEq)]
/// Everything the page renders: the controller view, the visible notices,
/// and the instant relative timestamps are measured from.
pub struct DashboardPageContext {
    pub view: DashboardView,
    pub notices: Vec<Notice>,
    pub now: DateTime<Utc>,
}

fn bool_attr(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn score_label(score: f64) -> String {
    format!("{score:.0}")
}

fn alert_status_label(status: AlertStatus) -> &'static str {
    match status {
        AlertStatus::New => "New",
        AlertStatus::Acknowledged => "Acknowledged",
        AlertStatus::Escalated => "Escalated",
        AlertStatus::FalsePositive => "False Positive",
    }
}

fn camera_status_label(status: CameraStatus) -> &'static str {
    match status {
        CameraStatus::Active => "Active",
        CameraStatus::Inactive => "Offline",
        CameraStatus::Maintenance => "Maintenance",
        CameraStatus::Unknown => "Unknown",
    }
}

fn threat_tier_label(tier: ThreatTier) -> &'static str {
    match tier {
        ThreatTier::Low => "Low",
        ThreatTier::Medium => "Medium",
        ThreatTier::High => "High",
        ThreatTier::Critical => "Critical",
    }
}

/// Percent-encodes one URL path segment (RFC 3986 unreserved set kept).
pub fn encode_path_segment(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn alert_action_path(alert_id: &str, action: &str) -> String {
    format!("/api/alerts/{}/{action}", encode_path_segment(alert_id))
}

fn feed_display(feed: &CameraFeed, key: &str, fallback: &str) -> String {
    feed.display_str(key).unwrap_or(fallback).to_string()
}

fn render_alert_row(index: usize, alert: &Alert, now: DateTime<Utc>) -> impl IntoView {
    let row_id = format!("vigil-alert-row-{index}");
    let score = score_label(alert.threat_score);
    let status = alert.status.as_str();
    let status_label = alert_status_label(alert.status);
    let actionable = alert.status == AlertStatus::New;
    let age = time_ago(alert.created_at, now);
    let acknowledge_path = alert_action_path(&alert.id, "acknowledge");
    let escalate_path = alert_action_path(&alert.id, "escalate");
    let false_positive_path = alert_action_path(&alert.id, "false-positive");
    let summary = format!("{} on {}", alert.threat_type, alert.camera_id);
    let location = alert.location.clone().unwrap_or_default();
    view! {
        <li
            id=row_id
            class="vigil-card"
            data-alert-id=alert.id.clone()
            data-alert-status=status
            data-threat-score=score.clone()
            data-actionable=bool_attr(actionable)
        >
            <p class="vigil-alert-summary">{summary}</p>
            <p class="vigil-alert-meta">
                <span data-field="score">{score.clone()}</span>
                " · "
                <span data-field="status">{status_label}</span>
                " · "
                <span data-field="age">{age}</span>
            </p>
            <p class="vigil-alert-location">{location}</p>
            <div class="vigil-alert-actions" aria-hidden=bool_attr(!actionable)>
                <form method="post" action=acknowledge_path data-intent="acknowledge">
                    <button type="submit">"Acknowledge"</button>
                </form>
                <form method="post" action=escalate_path data-intent="escalate">
                    <button type="submit">"Escalate"</button>
                </form>
                <form method="post" action=false_positive_path data-intent="false-positive">
                    <button type="submit">"False Positive"</button>
                </form>
            </div>
        </li>
    }
}

fn render_feed_tile(index: usize, feed: &CameraFeed, now: DateTime<Utc>) -> impl IntoView {
    let tile_id = format!("vigil-feed-{index}");
    let name = feed_display(feed, "name", &feed.id);
    let location = feed_display(feed, "location", "");
    let stream_url = feed_display(feed, "streamUrl", "");
    let last_activity = feed
        .last_activity
        .map(|timestamp| time_ago(timestamp, now))
        .unwrap_or_else(|| "no activity".to_string());
    view! {
        <li
            id=tile_id
            class="vigil-card"
            data-camera-id=feed.id.clone()
            data-camera-status=feed.status.as_str()
            data-stream-url=stream_url
        >
            <h3>{name}</h3>
            <p>{location}</p>
            <p>
                <span data-field="status">{camera_status_label(feed.status)}</span>
                " · "
                <span data-field="last-activity">{last_activity}</span>
            </p>
        </li>
    }
}

fn render_history_row(index: usize, event: &HistoryEvent, now: DateTime<Utc>) -> impl IntoView {
    let row_id = format!("vigil-history-row-{index}");
    let score = event.threat_score.map(score_label).unwrap_or_default();
    let camera = event.camera_id.clone().unwrap_or_default();
    view! {
        <li
            id=row_id
            data-event-type=event.event_type.clone()
            data-camera-id=camera
            data-threat-score=score
        >
            <span data-field="description">{event.description.clone()}</span>
            " · "
            <span data-field="age">{time_ago(event.timestamp, now)}</span>
        </li>
    }
}

fn render_toast(notice: &Notice) -> impl IntoView {
    let toast_id = format!("vigil-toast-{}", notice.id);
    let close_path = format!("/api/notices/{}", notice.id);
    view! {
        <li id=toast_id class="vigil-card" role="status" data-notice-kind=notice.kind.as_str()>
            <strong>{notice.title.clone()}</strong>
            <p>{notice.body.clone()}</p>
            <form method="post" action=close_path data-intent="close-notice" data-method="DELETE">
                <button type="submit" aria-label="Close notification">"×"</button>
            </form>
        </li>
    }
}

/// Renders the dashboard body fragment (`#vigil-dashboard`).
pub fn render_dashboard_page(context: DashboardPageContext) -> String {
    let dashboard = &context.view;
    let now = context.now;
    let loading = dashboard.loading;
    let demo_mode = dashboard.demo_mode();
    let live_connected = dashboard.live_connection.connected;
    let connection_state = if live_connected {
        "connected"
    } else {
        "disconnected"
    };
    let connection_label = if live_connected {
        "Live Feed Connected"
    } else {
        "Live Feed Disconnected"
    };
    let connection_error = dashboard.live_connection.last_error.clone().unwrap_or_default();
    let has_connection_error = !connection_error.is_empty();
    let reconnect_attempts = dashboard.live_connection.attempts.to_string();
    let data_mode = if dashboard.backend_connected {
        "live"
    } else {
        "demo"
    };
    let data_mode_label = if dashboard.backend_connected {
        "Live Mode"
    } else {
        "Demo Mode"
    };
    let last_update_label = format!("Last updated: {}", time_ago(dashboard.last_update, now));
    let alert_count = dashboard.alerts.len();
    let camera_count = dashboard.camera_feeds.len();
    let active_camera_count = dashboard
        .camera_feeds
        .iter()
        .filter(|feed| feed.status == CameraStatus::Active)
        .count();
    let load_error = dashboard.load_error.clone().unwrap_or_default();
    let has_load_error = !load_error.is_empty();

    let threat = &dashboard.threat_level;
    let threat_score = score_label(threat.score);
    let threat_tier = threat.level.as_str();
    let threat_tier_text = threat_tier_label(threat.level);
    let threat_label = threat.label.clone();
    let threat_updated = time_ago(threat.last_updated, now);
    let threat_width = format!("width: {}%", threat.score.clamp(0.0, 100.0).round());

    let alert_rows = dashboard
        .alerts
        .iter()
        .enumerate()
        .map(|(index, alert)| render_alert_row(index, alert, now))
        .collect_view();
    let feed_tiles = dashboard
        .camera_feeds
        .iter()
        .enumerate()
        .map(|(index, feed)| render_feed_tile(index, feed, now))
        .collect_view();
    let history_rows = dashboard
        .history
        .iter()
        .enumerate()
        .map(|(index, event)| render_history_row(index, event, now))
        .collect_view();
    let toasts = context.notices.iter().map(render_toast).collect_view();
    let notice_count = context.notices.len().to_string();

    let modal_alert = dashboard.modal.alert();
    let modal_open = modal_alert.is_some();
    let modal_state = if modal_open { "open" } else { "closed" };
    let modal_alert_id = modal_alert.map(|alert| alert.id.clone()).unwrap_or_default();
    let modal_title = modal_alert
        .map(|alert| format!("High Threat: {}", alert.threat_type))
        .unwrap_or_default();
    let modal_camera = modal_alert
        .map(|alert| alert.camera_id.clone())
        .unwrap_or_default();
    let modal_score = modal_alert
        .map(|alert| score_label(alert.threat_score))
        .unwrap_or_default();
    let modal_status = modal_alert
        .map(|alert| alert_status_label(alert.status))
        .unwrap_or_default();
    let modal_description = modal_alert
        .and_then(|alert| alert.description.clone())
        .unwrap_or_default();
    let modal_age = modal_alert
        .map(|alert| time_ago(alert.created_at, now))
        .unwrap_or_default();

    let page = view! {
        <div
            id="vigil-dashboard"
            data-app="vigil-dashboard"
            data-loading=bool_attr(loading)
            data-mode=data_mode
            data-simulation-enabled=bool_attr(dashboard.simulation_enabled)
        >
            <nav id="vigil-navbar" data-connection-state=connection_state>
                <h1>"Vigil Surveillance"</h1>
                <div id="vigil-connection">
                    <span id="vigil-connection-status">{connection_label}</span>
                    <span
                        id="vigil-connection-error"
                        data-reconnect-attempts=reconnect_attempts
                        aria-hidden=bool_attr(!has_connection_error)
                    >
                        {connection_error}
                    </span>
                    <form
                        id="vigil-reconnect"
                        method="post"
                        action="/api/live/reconnect"
                        data-intent="reconnect"
                        aria-hidden=bool_attr(live_connected)
                    >
                        <button type="submit">"Reconnect"</button>
                    </form>
                </div>
            </nav>
            <main id="vigil-main">
                <section id="vigil-status-bar">
                    <div>
                        <span id="vigil-last-update">{last_update_label}</span>
                        " "
                        <span id="vigil-data-mode" data-mode=data_mode>{data_mode_label}</span>
                    </div>
                    <div>
                        <span id="vigil-alert-count" data-count=alert_count.to_string()>
                            {format!("Alerts: {alert_count}")}
                        </span>
                        " "
                        <span
                            id="vigil-camera-count"
                            data-count=camera_count.to_string()
                            data-active-count=active_camera_count.to_string()
                        >
                            {format!("Cameras: {camera_count}")}
                        </span>
                    </div>
                </section>
                <section id="vigil-demo-banner" aria-hidden=bool_attr(!demo_mode)>
                    <h3>"Demo Mode Active"</h3>
                    <p>"Backend not available. Showing simulated surveillance data with live updates."</p>
                    <p id="vigil-load-error" aria-hidden=bool_attr(!has_load_error)>
                        <strong>"Error details: "</strong>
                        {load_error}
                    </p>
                </section>
                <section
                    id="vigil-threat-level"
                    class="vigil-card"
                    data-threat-tier=threat_tier
                    data-threat-score=threat_score.clone()
                >
                    <h2>"Threat Level"</h2>
                    <p id="vigil-threat-score">{threat_score.clone()}</p>
                    <p id="vigil-threat-label">{threat_label}" · "{threat_tier_text}</p>
                    <div class="vigil-threat-meter"><div class="vigil-threat-fill" style=threat_width></div></div>
                    <p id="vigil-threat-updated">{threat_updated}</p>
                </section>
                <div id="vigil-content-grid">
                    <section id="vigil-feed-grid" data-feed-count=camera_count.to_string()>
                        <h2>"Live Feeds"</h2>
                        <p data-empty-state="feeds" aria-hidden=bool_attr(camera_count > 0 || loading)>
                            "No camera feeds available"
                        </p>
                        <ul>{feed_tiles}</ul>
                    </section>
                    <section id="vigil-alerts-panel" data-alert-count=alert_count.to_string()>
                        <h2>"Active Alerts"</h2>
                        <p data-empty-state="alerts" aria-hidden=bool_attr(alert_count > 0 || loading)>
                            "No active alerts"
                        </p>
                        <ul id="vigil-alert-list">{alert_rows}</ul>
                    </section>
                </div>
                <section id="vigil-history" data-history-count=dashboard.history.len().to_string()>
                    <h2>"Event History"</h2>
                    <ol id="vigil-history-list">{history_rows}</ol>
                </section>
            </main>
            <div
                id="vigil-alert-modal"
                role="dialog"
                aria-modal="true"
                data-modal-state=modal_state
                data-alert-id=modal_alert_id
                aria-hidden=bool_attr(!modal_open)
            >
                <div class="vigil-card">
                    <h2 id="vigil-modal-title">{modal_title}</h2>
                    <p>
                        <span data-field="camera">{modal_camera}</span>
                        " · "
                        <span data-field="score">{modal_score}</span>
                        " · "
                        <span data-field="status">{modal_status}</span>
                        " · "
                        <span data-field="age">{modal_age}</span>
                    </p>
                    <p data-field="description">{modal_description}</p>
                    <form method="post" action="/api/modal/acknowledge" data-intent="modal-acknowledge">
                        <button type="submit">"Acknowledge"</button>
                    </form>
                    <form method="post" action="/api/modal/escalate" data-intent="modal-escalate">
                        <button type="submit">"Escalate"</button>
                    </form>
                    <form method="post" action="/api/modal/false-positive" data-intent="modal-false-positive">
                        <button type="submit">"False Positive"</button>
                    </form>
                    <form method="post" action="/api/modal/dismiss" data-intent="modal-dismiss">
                        <button type="submit">"Close"</button>
                    </form>
                </div>
            </div>
            <ul id="vigil-toasts" data-notice-count=notice_count>{toasts}</ul>
        </div>
    };
    page.to_html()
}

/// Wraps [`render_dashboard_page`] in a complete HTML document.
pub fn render_dashboard_document(context: DashboardPageContext) -> String {
    let body = render_dashboard_page(context);
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"/>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\
         <title>Vigil Surveillance Dashboard</title><style>{DASHBOARD_DOCUMENT_STYLE}</style>\
         </head><body>{body}<script>{DASHBOARD_DOCUMENT_SCRIPT}</script></body></html>"
    )
}
