// Scan all USB serial ports for FALA devices and print what answered.

use fala_rs::FalaConnector;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Scanning for FALA devices...\n");

    let devices = FalaConnector::get_available_devices()?;
    if devices.is_empty() {
        println!("No FALA device answered. Is the Bus Pirate in FALA binary mode?");
        return Ok(());
    }

    for device in devices {
        println!("{} at {}", device.name, device.port);
        println!("  channels:    {}", device.header.channel_count);
        println!("  sample rate: {} Hz", device.header.sample_rate);
        println!("  sample mem:  {} samples", device.header.sample_count);
    }

    Ok(())
}
