//! Formatted output helpers for CLI commands.
//!
//! Progress lines go to stderr; service logs and listings go to stdout.

use std::sync::Arc;

use convoy_common::constants::CONTAINER_ID;
use convoy_common::types::ContainerState;
use convoy_project::{EventType, ProjectEvent};
use convoy_runtime::LogSink;
use tokio::sync::mpsc;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Renders an event as a progress line, or `None` if it is not shown.
#[must_use]
pub fn describe(event: &ProjectEvent) -> Option<String> {
    let service = &event.service_name;
    match event.event {
        EventType::NoEvent | EventType::ServiceAdd => None,
        EventType::ProjectReload | EventType::ProjectReloadTrigger => {
            Some(format!("  {YELLOW}{}{RESET} {DIM}({service}){RESET}", event.event))
        }
        _ if event.is_project_event() => Some(format!("{BOLD}{}{RESET}", event.event)),
        EventType::ContainerCreated | EventType::ContainerStarted => {
            let id = event.data.get(CONTAINER_ID).map_or("", |id| id.get(..12).unwrap_or(id));
            Some(format!("  {DIM}{service}: {} {id}{RESET}", event.event))
        }
        EventType::ServiceUp
        | EventType::ServiceCreate
        | EventType::ServiceDown
        | EventType::ServiceDelete
        | EventType::ServiceRestart
        | EventType::ServiceKill
        | EventType::ServicePull => Some(format!("  {GREEN}●{RESET} {BOLD}{service}{RESET} {}", event.event)),
        EventType::ServiceUpIgnored => Some(format!("  {DIM}{service}: {}{RESET}", event.event)),
        _ => Some(format!("  {service}: {}", event.event)),
    }
}

/// Prints events until every sender is gone.
pub async fn print_events(mut rx: mpsc::Receiver<ProjectEvent>) {
    while let Some(event) = rx.recv().await {
        if let Some(line) = describe(&event) {
            eprintln!("{line}");
        }
    }
}

/// A log sink printing `service | line` to stdout.
#[must_use]
pub fn stdout_log_sink() -> LogSink {
    Arc::new(|service: &str, line: &str| println!("{CYAN}{service}{RESET} | {line}"))
}

/// Colours a container state for listings.
#[must_use]
pub fn format_state(state: ContainerState) -> String {
    match state {
        ContainerState::Running => format!("{GREEN}{state}{RESET}"),
        ContainerState::Failed => format!("{YELLOW}{state}{RESET}"),
        ContainerState::Created | ContainerState::Stopped => format!("{DIM}{state}{RESET}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn event(event: EventType, service: &str) -> ProjectEvent {
        ProjectEvent {
            event,
            service_name: service.to_string(),
            data: BTreeMap::new(),
        }
    }

    #[test]
    fn hidden_events() {
        assert!(describe(&event(EventType::ServiceAdd, "web")).is_none());
        assert!(describe(&event(EventType::NoEvent, "")).is_none());
    }

    #[test]
    fn project_events_are_headlines() {
        let line = describe(&event(EventType::ProjectUpStart, "")).unwrap();
        assert!(line.contains("Starting project"));
    }

    #[test]
    fn service_done_names_service() {
        let line = describe(&event(EventType::ServiceUp, "web")).unwrap();
        assert!(line.contains("web"));
        assert!(line.contains("Started"));
    }

    #[test]
    fn container_events_show_short_id() {
        let mut e = event(EventType::ContainerCreated, "db");
        let _ = e
            .data
            .insert(CONTAINER_ID.to_string(), "0123456789abcdef0123".to_string());
        let line = describe(&e).unwrap();
        assert!(line.contains("0123456789ab"));
        assert!(!line.contains("0123456789abc"));
    }

    #[test]
    fn reload_events_name_the_trigger() {
        let line = describe(&event(EventType::ProjectReloadTrigger, "config")).unwrap();
        assert!(line.contains("Triggering project reload"));
        assert!(line.contains("config"));
    }

    #[test]
    fn running_state_is_highlighted() {
        assert!(format_state(ContainerState::Running).contains("running"));
        assert!(format_state(ContainerState::Running).starts_with(GREEN));
    }
}
