use std::io::{self, Write};

use chargewatch_compute::Decision;
use chargewatch_core::config::StationConfig;
use chargewatch_core::{Feature, ServiceTicket, TicketSlot};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::state::MonitoringState;

const RULE_WIDTH: usize = 80;

/// Color scheme for the dashboard.
struct Colors;

impl Colors {
    const FRAME: Color = Color::Cyan;
    const SECTION: Color = Color::Yellow;
    const NORMAL: Color = Color::Green;
    const ALERT: Color = Color::Red;
    const TICKET_ID: Color = Color::Cyan;
    const URGENCY: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
}

/// Where each cycle's view goes.
pub trait Dashboard {
    fn render(&mut self, station: &StationConfig, state: &MonitoringState) -> io::Result<()>;
}

/// Full-screen console renderer.
pub struct ConsoleDashboard<W: Write> {
    out: W,
    clear_screen: bool,
}

impl<W: Write> ConsoleDashboard<W> {
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self { out, clear_screen }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rule(&mut self, ch: char, color: Option<Color>) -> io::Result<()> {
        let line: String = std::iter::repeat(ch).take(RULE_WIDTH).collect();
        match color {
            Some(c) => queue!(self.out, SetForegroundColor(c), Print(line), ResetColor, Print("\n")),
            None => queue!(self.out, Print(line), Print("\n")),
        }
    }

    fn section(&mut self, title: &str) -> io::Result<()> {
        queue!(
            self.out,
            Print("\n"),
            SetForegroundColor(Colors::SECTION),
            Print(format!("--- {title} ---\n")),
            ResetColor,
        )
    }

    fn header(&mut self, station: &StationConfig, decision: Option<Decision>) -> io::Result<()> {
        self.rule('=', Some(Colors::FRAME))?;
        queue!(
            self.out,
            SetForegroundColor(Colors::FRAME),
            SetAttribute(Attribute::Bold),
            Print("      EV CHARGING STATION - AUTONOMOUS PREDICTIVE MAINTENANCE SYSTEM\n"),
            SetAttribute(Attribute::Reset),
            ResetColor,
        )?;
        self.rule('=', Some(Colors::FRAME))?;

        let (label, color) = match decision {
            Some(d) if d.is_anomalous() => (d.status_label(), Colors::ALERT),
            Some(d) => (d.status_label(), Colors::NORMAL),
            None => ("NO DATA", Colors::DIM),
        };
        queue!(
            self.out,
            Print(format!(
                "STATION ID: {} ({})   |   SYSTEM STATUS: ",
                station.id, station.location
            )),
            SetForegroundColor(color),
            Print(label),
            ResetColor,
            Print("\n"),
        )?;
        self.rule('-', None)
    }

    fn sensors(&mut self, state: &MonitoringState) -> io::Result<()> {
        self.section("LIVE SENSOR DATA")?;
        let Some(reading) = state.last_reading else {
            return queue!(self.out, Print("(no reading this cycle)\n"));
        };
        for feature in Feature::ALL {
            queue!(
                self.out,
                Print(format!("{:<25}: {:.2}\n", feature.label(), reading.get(feature)))
            )?;
        }
        if let Some(a) = state.last_assessment {
            queue!(
                self.out,
                SetForegroundColor(Colors::DIM),
                Print(format!("{:<25}: {:.3} (threshold {:.3})\n", "Anomaly Score", a.score, a.threshold)),
                ResetColor,
            )?;
        }
        Ok(())
    }

    fn ticket(&mut self, ticket: &ServiceTicket) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(Colors::TICKET_ID),
            Print(format!("Ticket ID: {}\n", ticket.ticket_id_or_na())),
            SetForegroundColor(Colors::URGENCY),
            Print(format!("Urgency: {}\n", ticket.urgency_or_na())),
            ResetColor,
            Print(format!("Predicted Failure: {}\n", ticket.failure_mode_or_na())),
            Print(format!("Technician Notes: {}\n", ticket.notes_or_na())),
        )?;

        if let Some(parts) = ticket.required_parts.as_ref().filter(|p| !p.is_empty()) {
            queue!(self.out, Print("Required Parts:\n"))?;
            for part in parts {
                queue!(self.out, Print(format!("  - {}\n", part.describe())))?;
            }
        }
        if let Some(steps) = ticket.service_instructions.as_ref().filter(|s| !s.is_empty()) {
            queue!(self.out, Print("Service Instructions:\n"))?;
            for (i, step) in steps.iter().enumerate() {
                queue!(self.out, Print(format!("  {}. {}\n", i + 1, step)))?;
            }
        }
        Ok(())
    }

    fn footer(&mut self, state: &MonitoringState) -> io::Result<()> {
        queue!(self.out, Print("\n"))?;
        if state.consecutive_failures > 0 {
            queue!(
                self.out,
                SetForegroundColor(Colors::ALERT),
                Print(format!(
                    "Ticket service degraded: {} consecutive failure(s)\n",
                    state.consecutive_failures
                )),
                ResetColor,
            )?;
        }
        queue!(
            self.out,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "cycle {} | anomalies {} | ticket failures {}\n",
                state.cycle, state.total_anomalies, state.total_failures
            )),
            ResetColor,
        )?;
        self.rule('=', Some(Colors::FRAME))
    }
}

impl<W: Write> Dashboard for ConsoleDashboard<W> {
    fn render(&mut self, station: &StationConfig, state: &MonitoringState) -> io::Result<()> {
        if self.clear_screen {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }

        self.header(station, state.last_assessment.map(|a| a.decision))?;
        self.sensors(state)?;

        self.section("SERVICE TICKET")?;
        match &state.slot {
            TicketSlot::Initializing => {
                queue!(self.out, Print(format!("{}\n", TicketSlot::INITIALIZING_MESSAGE)))?
            }
            TicketSlot::Ready(ticket) => self.ticket(ticket)?,
            TicketSlot::Failed(err) => queue!(
                self.out,
                SetForegroundColor(Colors::ALERT),
                Print(format!("Error: {}\n", err.error)),
                ResetColor,
            )?,
        }

        self.footer(state)?;
        self.out.flush()
    }
}
