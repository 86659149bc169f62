//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use super::app::DebuggerApp;
use crate::machine::MachineState;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(frame.area());

    // Left side: memory, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(9),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_memory(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: stack, output and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(6),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_stack(frame, right_chunks[0], app);
    draw_output(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Memory listing with the PC and breakpoints highlighted.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = (area.height as usize).saturating_sub(2);

    let items: Vec<ListItem> = app
        .memory_listing(rows)
        .into_iter()
        .map(|(addr, text, is_pc)| {
            let prefix = if is_pc { "▶ " } else { "  " };
            let is_bp = i32::try_from(addr).map_or(false, |a| app.breakpoints.contains(&a));
            let bp = if is_bp { "●" } else { " " };

            let style = if is_pc {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if is_bp {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}{:03}: {}", bp, prefix, addr, text)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let dp = app.cu.datapath();
    let regs = &dp.regs;
    let flags = dp.alu.flags;
    let opt = |v: Option<i32>| v.map_or_else(|| "-".to_string(), |v| v.to_string());

    let signals: Vec<String> = app
        .cu
        .row_signals(app.cu.mc_address())
        .iter()
        .map(|s| format!("{:?}", s))
        .collect();

    let state_style = if app.cu.state() == MachineState::Running {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };

    let content = vec![
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:<6}", regs.pc), Style::default().fg(Color::Yellow)),
            Span::raw("AR: "),
            Span::styled(format!("{:<6}", regs.ar), Style::default().fg(Color::White)),
            Span::raw("IR: "),
            Span::styled(regs.ir.to_string(), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw("TOS: "),
            Span::styled(format!("{:<12}", opt(regs.tos)), Style::default().fg(Color::White)),
            Span::raw("BR: "),
            Span::styled(opt(regs.br), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw("ALU: "),
            Span::raw(format!("{} , {} → {}", dp.alu.first, dp.alu.second, dp.alu.result)),
            Span::raw("   NZV: "),
            Span::styled(
                format!("{}{}{}", flags.negative as u8, flags.zero as u8, flags.overflow as u8),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::raw("MC: "),
            Span::styled(format!("{:02}", app.cu.mc_address()), Style::default().fg(Color::Magenta)),
            Span::raw(format!("  {}", signals.join(" "))),
        ]),
        Line::from(vec![
            Span::raw("Ticks: "),
            Span::styled(app.cu.ticks().to_string(), Style::default().fg(Color::Cyan)),
            Span::raw("   Instr: "),
            Span::styled(
                format!("{}/{}", app.cu.instructions(), app.cu.limit()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", app.cu.state()), state_style),
        ]),
    ];

    let paragraph = Paragraph::new(content).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );

    frame.render_widget(paragraph, area);
}

/// Data stack, newest first.
fn draw_stack(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let stack = &app.cu.datapath().stack;

    let items: Vec<ListItem> = stack
        .as_slice()
        .iter()
        .enumerate()
        .rev()
        .map(|(depth, value)| ListItem::new(format!("{:02}: {}", depth, value)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(format!(" Stack {}/{} ", stack.len(), stack.max_size()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );

    frame.render_widget(list, area);
}

fn draw_output(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let dp = app.cu.datapath();
    let output = Paragraph::new(dp.output_text())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(format!(" Output ({} input pending) ", dp.pending_input()))
                .borders(Borders::ALL),
        );

    frame.render_widget(output, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default().title(" Status ").borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  t: Row  r: Run  p: Pause"),
        Line::from("b: Breakpoint  x: Reset  ↑↓: Scroll"),
        Line::from("q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().title(" Help ").borders(Borders::ALL));

    frame.render_widget(help, area);
}
