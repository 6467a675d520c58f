use crossterm::style::{StyledContent, Stylize};
use ic_tester::{Bus, ByteChannel, DramBus, MirrorBus, NoDelay, ProtocolError, Response, Tester};
use std::io::{self, BufRead, Write};
use std::time::Duration;

// The main entry point for the tester simulator application.
fn main() {
    println!("==========================");
    println!("    IC Tester Simulator   ");
    println!("==========================");

    // Pick the simulated part sitting in the DUT socket.
    println!("\nSelect the simulated DUT:");
    println!("  1. Straight loopback (bank 1 echoes bank 0)");
    println!("  2. Inverting loopback (bank 1 echoes ~bank 0)");
    println!("  3. 65536x1 DRAM");
    println!("  4. 65536x1 DRAM with a stuck cell (defective part)");
    print!("> ");
    io::stdout().flush().unwrap();

    let mut choice = String::new();
    io::stdin().read_line(&mut choice).unwrap();

    match choice.trim() {
        "1" => run_menu(Tester::new(MirrorBus::new(0, 1), NoDelay)),
        "2" => run_menu(Tester::new(MirrorBus::inverting(0, 1), NoDelay)),
        "3" => run_menu(Tester::new(DramBus::new(), NoDelay)),
        "4" => {
            let mut chip = DramBus::new();
            chip.stick_cell(0x5A5A, 0);
            run_menu(Tester::new(chip, NoDelay));
        }
        _ => eprintln!("[ERROR] Invalid choice. Please enter 1, 2, 3 or 4."),
    }
}

// Main menu loop for the constructed tester.
fn run_menu<B: Bus>(mut tester: Tester<B, NoDelay>) {
    loop {
        println!("\nSelect mode:");
        println!("  1. Manual Command Input");
        println!("  2. Listen on Serial Port");
        println!("  3. Exit");
        print!("> ");
        io::stdout().flush().unwrap();

        let mut choice = String::new();
        io::stdin().read_line(&mut choice).unwrap();

        match choice.trim() {
            "1" => run_manual_mode(&mut tester),
            "2" => run_serial_mode(&mut tester),
            "3" => break,
            _ => eprintln!("[ERROR] Invalid choice. Please enter 1, 2, or 3."),
        }
    }
}

// Handles the manual command input mode.
fn run_manual_mode<B: Bus>(tester: &mut Tester<B, NoDelay>) {
    println!("\n--- Manual Mode ---");
    println!("Enter command bytes in hex, e.g. '40 00' to run the uploaded test once,");
    println!("or type 'back' to return to the main menu.");
    print!("> ");
    io::stdout().flush().unwrap();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let input = line.unwrap();
        let text = input.trim();

        if text == "back" {
            break;
        }

        if text.is_empty() {
            print!("> ");
            io::stdout().flush().unwrap();
            continue;
        }

        match parse_hex_bytes(text) {
            Ok(bytes) => {
                let mut channel = ByteChannel::new(bytes);
                drain_channel(tester, &mut channel);
            }
            Err(token) => eprintln!("[ERROR] '{}' is not a hex byte.", token),
        }
        print!("> ");
        io::stdout().flush().unwrap();
    }
}

// Runs every command already buffered in the channel, printing each verdict.
fn drain_channel<B: Bus>(tester: &mut Tester<B, NoDelay>, channel: &mut ByteChannel) {
    loop {
        match tester.dispatch(channel) {
            Ok(verdict) => println!("< {}", styled_verdict(verdict)),
            Err(ProtocolError::ChannelClosed) => break,
            Err(err) => {
                eprintln!("[ERROR] Channel error: {}", err);
                break;
            }
        }
    }
}

// Handles the serial port listening mode.
fn run_serial_mode<B: Bus>(tester: &mut Tester<B, NoDelay>) {
    println!("\n--- Serial Mode ---");

    // List available serial ports.
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(err) => {
            eprintln!("[ERROR] Could not enumerate serial ports: {}", err);
            return;
        }
    };

    if ports.is_empty() {
        eprintln!("[ERROR] No serial ports found.");
        return;
    }

    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {}", i, port.port_name);
    }

    // Get user's choice of serial port.
    print!("Select a port (number): ");
    io::stdout().flush().unwrap();
    let mut port_choice = String::new();
    io::stdin().read_line(&mut port_choice).unwrap();
    let port_index: usize = match port_choice.trim().parse() {
        Ok(i) if i < ports.len() => i,
        _ => {
            eprintln!("[ERROR] Invalid port selection.");
            return;
        }
    };
    let port_name = &ports[port_index].port_name;

    // Get user's choice of baud rate. 500000 is what the stock host tool
    // talks at.
    let baud_rates = [500000, 115200, 57600, 38400, 19200, 9600];
    println!("Available baud rates:");
    for (i, &rate) in baud_rates.iter().enumerate() {
        println!("  {}: {}", i, rate);
    }
    print!("Select a baud rate (number, default 0): ");
    io::stdout().flush().unwrap();
    let mut baud_choice = String::new();
    io::stdin().read_line(&mut baud_choice).unwrap();
    let baud_rate = match baud_choice.trim() {
        "" => baud_rates[0],
        s => match s.parse::<usize>() {
            Ok(i) if i < baud_rates.len() => baud_rates[i],
            _ => {
                eprintln!("[ERROR] Invalid baud rate selection.");
                return;
            }
        },
    };

    // Open the selected serial port. The timeout bounds the idle wait for
    // the first byte of a command; payload bytes arrive back to back.
    let mut port = match serialport::new(port_name, baud_rate)
        .timeout(Duration::from_millis(100))
        .open()
    {
        Ok(port) => port,
        Err(err) => {
            eprintln!("[ERROR] Failed to open port '{}': {}", port_name, err);
            return;
        }
    };

    println!(
        "\nListening on {} at {} baud. Press Ctrl+C to exit.",
        port_name, baud_rate
    );

    loop {
        match tester.dispatch(&mut port) {
            Ok(verdict) => println!("< {}", styled_verdict(verdict)),
            Err(ProtocolError::ChannelClosed) => {
                eprintln!("[WARNING] Serial channel closed.");
                break;
            }
            Err(ProtocolError::Io(err)) if err.kind() == io::ErrorKind::TimedOut => (),
            Err(ProtocolError::Io(err)) => {
                eprintln!("[ERROR] Serial port error: {}", err);
                break;
            }
        }
    }
}

fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, &str> {
    text.split_whitespace()
        .map(|token| u8::from_str_radix(token, 16).map_err(|_| token))
        .collect()
}

fn styled_verdict(verdict: Response) -> StyledContent<&'static str> {
    match verdict {
        Response::Ok => "OK".green(),
        Response::Err => "ERR".magenta().bold(),
        Response::Pass => "PASS".green().bold(),
        Response::Fail => "FAIL".red().bold(),
    }
}
