//! Serial port listing.

use agrinode::{NativePortEnumerator, PortEnumerator, PortInfo};
use anyhow::{Context, Result};
use console::style;

/// List serial ports, camera candidates (USB bridges) first.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let mut ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;
    ports.sort_by(|a, b| b.is_usb().cmp(&a.is_usb()).then_with(|| a.name.cmp(&b.name)));

    if json {
        let values: Vec<serde_json::Value> = ports.iter().map(port_json).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    eprintln!("{}", style("Serial ports").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &ports {
        let vid_pid = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" ({vid:04X}:{pid:04X})"),
            _ => String::new(),
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{}{}",
            if port.is_usb() {
                style("•").green()
            } else {
                style("•").dim()
            },
            style(&port.name).cyan(),
            vid_pid,
            product
        );
    }

    Ok(())
}

fn port_json(port: &PortInfo) -> serde_json::Value {
    serde_json::json!({
        "name": port.name,
        "usb": port.is_usb(),
        "vid": port.vid,
        "pid": port.pid,
        "manufacturer": port.manufacturer,
        "product": port.product,
    })
}
