//! Interactive menu and port listing
//!
//! The menu runs on its own thread with a `rustyline` prompt and offers the
//! module's context menu: driver, input and output selection, plus a few
//! commands for driving the standalone host.

use anyhow::{Context, Result};
use colored::*;
use parking_lot::Mutex;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

use crate::host::ResetRequests;
use crate::midi::format_hex;
use crate::sequencer::MidiMixSeq;
use crate::transport::{open_driver, DeviceInfo, MidiDriver, DRIVER_NAMES};

const PROMPT: &str = "midimix> ";

const HELP: &str = "\
Commands:
  drivers            list MIDI drivers
  driver <name>      select a driver
  inputs             list input devices
  input <id>|off     select or release the input device
  outputs            list output devices
  output <id>|off    select or release the output device
  status             show bindings, lanes and outputs
  reset <lane>       pulse a lane's reset input (1-3)
  sync               resend every button LED
  inject <hex>...    push raw MIDI bytes into the input queue
  help               show this text
  quit               exit";

/// A parsed menu line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Help,
    Drivers,
    Driver(String),
    Inputs,
    /// `None` releases the input
    Input(Option<usize>),
    Outputs,
    /// `None` releases the output
    Output(Option<usize>),
    Status,
    /// Zero-based lane index
    Reset(usize),
    Sync,
    Inject(Vec<u8>),
    Quit,
}

/// What the menu loop should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    Continue(String),
    Quit,
}

/// Everything the menu needs to reach
#[derive(Clone)]
pub struct MenuContext {
    pub module: Arc<Mutex<MidiMixSeq>>,
    pub resets: Arc<ResetRequests>,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<MenuCommand>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (head.to_lowercase().as_str(), args.as_slice()) {
        ("help" | "?", []) => MenuCommand::Help,
        ("drivers", []) => MenuCommand::Drivers,
        ("driver", [name]) => MenuCommand::Driver(name.to_string()),
        ("inputs", []) => MenuCommand::Inputs,
        ("input", [id]) => MenuCommand::Input(parse_device_id(id)?),
        ("outputs", []) => MenuCommand::Outputs,
        ("output", [id]) => MenuCommand::Output(parse_device_id(id)?),
        ("status", []) => MenuCommand::Status,
        ("reset", [lane]) => {
            let lane: usize = lane
                .parse()
                .with_context(|| format!("Invalid lane '{}'", lane))?;
            if lane == 0 {
                anyhow::bail!("Lanes are numbered from 1");
            }
            MenuCommand::Reset(lane - 1)
        }
        ("sync", []) => MenuCommand::Sync,
        ("inject", bytes) if !bytes.is_empty() => {
            let data = bytes
                .iter()
                .map(|b| {
                    u8::from_str_radix(b.trim_start_matches("0x"), 16)
                        .with_context(|| format!("Invalid hex byte '{}'", b))
                })
                .collect::<Result<Vec<u8>>>()?;
            MenuCommand::Inject(data)
        }
        ("quit" | "exit", []) => MenuCommand::Quit,
        (other, _) => anyhow::bail!("Unknown command or arguments: '{}' (try 'help')", other),
    };

    Ok(Some(command))
}

fn parse_device_id(word: &str) -> Result<Option<usize>> {
    if word.eq_ignore_ascii_case("off") || word.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let id = word
        .parse()
        .with_context(|| format!("Invalid device id '{}'", word))?;
    Ok(Some(id))
}

/// Run one command against the module
pub fn execute(ctx: &MenuContext, command: MenuCommand) -> Result<MenuOutcome> {
    let text = match command {
        MenuCommand::Help => HELP.to_string(),
        MenuCommand::Drivers => {
            let module = ctx.module.lock();
            let current = module.binding().driver_name().map(str::to_lowercase);
            let lines: Vec<String> = DRIVER_NAMES
                .iter()
                .map(|name| item_line(current.as_deref() == Some(*name), name))
                .collect();
            lines.join("\n")
        }
        MenuCommand::Driver(name) => {
            let driver = open_driver(&name)?;
            let text = format!("Driver: {}", driver.name().green());
            ctx.module.lock().select_driver(driver);
            text
        }
        MenuCommand::Inputs => {
            let module = ctx.module.lock();
            let driver = selected_driver(&module)?;
            device_lines(&driver.input_devices(), |id| {
                module.binding().is_input_selected(id)
            })
        }
        MenuCommand::Outputs => {
            let module = ctx.module.lock();
            let driver = selected_driver(&module)?;
            device_lines(&driver.output_devices(), |id| {
                module.binding().is_output_selected(id)
            })
        }
        MenuCommand::Input(Some(id)) => {
            let mut module = ctx.module.lock();
            module
                .subscribe_input(id)
                .with_context(|| format!("Failed to open input {}", id))?;
            format!("Input: {}", module.binding().input_name().unwrap_or("?").green())
        }
        MenuCommand::Input(None) => {
            ctx.module.lock().unsubscribe_input();
            "Input released".to_string()
        }
        MenuCommand::Output(Some(id)) => {
            let mut module = ctx.module.lock();
            module
                .subscribe_output(id)
                .with_context(|| format!("Failed to open output {}", id))?;
            format!("Output: {}", module.binding().output_name().unwrap_or("?").green())
        }
        MenuCommand::Output(None) => {
            ctx.module.lock().unsubscribe_output();
            "Output released".to_string()
        }
        MenuCommand::Status => status_text(&ctx.module.lock()),
        MenuCommand::Reset(lane) => {
            let lanes = ctx.module.lock().lane_count();
            if lane >= lanes || !ctx.resets.request(lane) {
                anyhow::bail!("Lane {} does not exist ({} lanes configured)", lane + 1, lanes);
            }
            format!("Reset lane {}", lane + 1)
        }
        MenuCommand::Sync => {
            let mut module = ctx.module.lock();
            if !module.binding().has_output() {
                anyhow::bail!("No output selected");
            }
            module.sync_buttons();
            "Button LEDs resent".to_string()
        }
        MenuCommand::Inject(data) => {
            let module = ctx.module.lock();
            if !module.input_queue().push_raw(&data) {
                anyhow::bail!("Rejected: {}", format_hex(&data));
            }
            format!("Queued: {}", format_hex(&data))
        }
        MenuCommand::Quit => return Ok(MenuOutcome::Quit),
    };

    Ok(MenuOutcome::Continue(text))
}

fn selected_driver(module: &MidiMixSeq) -> Result<Arc<dyn MidiDriver>> {
    module
        .binding()
        .driver()
        .cloned()
        .context("No driver selected (use 'driver <name>')")
}

fn item_line(selected: bool, label: &str) -> String {
    if selected {
        format!("  {} {}", "✔".green(), label.bold())
    } else {
        format!("    {}", label)
    }
}

fn device_lines(devices: &[DeviceInfo], selected: impl Fn(usize) -> bool) -> String {
    if devices.is_empty() {
        return format!("  {}", "No devices found".dimmed());
    }
    devices
        .iter()
        .map(|d| item_line(selected(d.id), &format!("[{}] {}", d.id, d.name)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_text(module: &MidiMixSeq) -> String {
    let binding = module.binding();
    let mut lines = vec![
        format!("Driver: {}", binding.driver_name().unwrap_or("none")),
        format!("Input:  {}", binding.input_name().unwrap_or("none")),
        format!("Output: {}", binding.output_name().unwrap_or("none")),
        format!(
            "Frame:  {} ({} queued)",
            module.frame(),
            module.input_queue().len()
        ),
    ];

    let outputs = module.outputs();
    for index in 0..module.lane_count() {
        if let Some(lane) = module.lane(index) {
            lines.push(format!(
                "Lane {}: step {}/{}  gate {:>4.1} V  cv {:>5.2} V",
                index + 1,
                lane.position() + 1,
                lane.cycle_length(),
                outputs.gates[index],
                outputs.cvs[index]
            ));
        }
    }

    lines.join("\n")
}

/// Blocking menu loop; returns when the user quits or closes the prompt
pub fn run_menu(ctx: MenuContext) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to start menu prompt")?;
    println!("{}", "Type 'help' for commands".dimmed());

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Menu prompt failed"),
        };
        let _ = editor.add_history_entry(line.as_str());

        let outcome = parse_command(&line).and_then(|command| match command {
            Some(command) => execute(&ctx, command),
            None => Ok(MenuOutcome::Continue(String::new())),
        });

        match outcome {
            Ok(MenuOutcome::Continue(text)) if text.is_empty() => {}
            Ok(MenuOutcome::Continue(text)) => println!("{}", text),
            Ok(MenuOutcome::Quit) => break,
            Err(e) => println!("{} {:#}", "✗".red(), e),
        }
    }

    Ok(())
}

/// Print every driver's devices
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    for name in DRIVER_NAMES {
        let driver = match open_driver(name) {
            Ok(driver) => driver,
            Err(e) => {
                println!("\n{} {}", name.bold(), e.to_string().red());
                continue;
            }
        };

        println!("\n{}", format!("[{}]", driver.name()).bold().yellow());
        println!("{}", "Input Ports:".bold());
        println!("{}", device_lines(&driver.input_devices(), |_| false));
        println!("{}", "Output Ports:".bold());
        println!("{}", device_lines(&driver.output_devices(), |_| false));
    }

    println!();
}
