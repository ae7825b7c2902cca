use std::{fs, io, path::Path, thread, time::Duration};

use crossbeam_channel::Sender;

pub const NET_CONNECT_TIMEOUT: Duration = Duration::from_millis(8 * 1000);

pub const NET_IO_TIMEOUT: Duration = Duration::from_millis(16 * 1000);

pub fn default_ureq_agent_builder(
    proxy_url: Option<&str>,
) -> ureq::config::ConfigBuilder<ureq::typestate::AgentScope> {
    let mut agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(20)))
        .timeout_connect(Some(NET_CONNECT_TIMEOUT))
        .timeout_recv_response(Some(NET_IO_TIMEOUT))
        .timeout_send_request(Some(NET_IO_TIMEOUT));

    if let Some(proxy_url) = proxy_url {
        let proxy = ureq::Proxy::new(proxy_url).ok();
        agent = agent.proxy(proxy);
    }

    agent
}

pub fn mkdir_if_not_exists(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).or_else(|err| {
        if err.kind() == io::ErrorKind::AlreadyExists {
            Ok(())
        } else {
            Err(err)
        }
    })
}

/// Deliver `event` to `sender` once `delay` has passed.  The send is silently
/// dropped if the receiving side is gone by then.
pub fn send_after<T: Send + 'static>(delay: Duration, sender: Sender<T>, event: T) {
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = sender.send(event);
    });
}

/// Returns true for strings the backend uses in place of a missing value.
pub fn is_blank(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == "null" || value == "undefined"
}
