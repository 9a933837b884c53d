use crate::core::selectors::{GridSelectors, Timings};
use crate::core::wait::{poll_until, WaitOutcome};
use crate::domain::model::EventSelection;
use crate::domain::ports::{BrowserSession, Clock, Locator};
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    AlreadySelected,
    /// The dropdown shows the label and the grid content changed.
    Refreshed { attempts: u32 },
    /// The option was clicked but no refresh was observed within the poll budget.
    Unconfirmed,
    OptionNotFound,
    ControlNotFound,
    Failed { reason: String },
}

impl SelectionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SelectionOutcome::AlreadySelected
                | SelectionOutcome::Refreshed { .. }
                | SelectionOutcome::Unconfirmed
        )
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Switches the results grid to another event through the filter dropdown.
pub struct EventSelector<'a, S: BrowserSession + ?Sized, C: Clock + ?Sized> {
    session: &'a S,
    clock: &'a C,
    selectors: &'a GridSelectors,
    timings: &'a Timings,
}

impl<'a, S: BrowserSession + ?Sized, C: Clock + ?Sized> EventSelector<'a, S, C> {
    pub fn new(session: &'a S, clock: &'a C, selectors: &'a GridSelectors, timings: &'a Timings) -> Self {
        Self {
            session,
            clock,
            selectors,
            timings,
        }
    }

    pub async fn select(&self, label: &str) -> SelectionOutcome {
        tracing::info!("Selecting event: {}", label);
        match self.try_select(label).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Error selecting event '{}': {}", label, e);
                SelectionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_select(&self, label: &str) -> Result<SelectionOutcome> {
        let Some((control, current_text)) = self.locate_control().await? else {
            tracing::warn!("Could not find event dropdown");
            return Ok(SelectionOutcome::ControlNotFound);
        };
        tracing::debug!("Found dropdown with text: '{}'", current_text);

        if contains_ignore_case(&current_text, label) {
            tracing::info!("Already selected: '{}'", current_text);
            return Ok(SelectionOutcome::AlreadySelected);
        }

        let selection = EventSelection {
            label: label.to_string(),
            prior_first_athlete: self.first_athlete().await,
        };
        if let Some(name) = &selection.prior_first_athlete {
            tracing::debug!("First athlete before: '{}'", name);
        }

        self.session.click(&control).await?;
        self.clock.sleep(Timings::ms(self.timings.dropdown_open_ms)).await;

        let Some(option) = self.find_option(label).await? else {
            tracing::warn!("Could not find option containing: {}", label);
            if let Err(e) = self.session.click(&Locator::first(&self.selectors.body)).await {
                tracing::debug!("Could not dismiss dropdown: {}", e);
            }
            self.clock.sleep(Timings::ms(self.timings.dismiss_ms)).await;
            return Ok(SelectionOutcome::OptionNotFound);
        };

        self.session.click(&option).await?;
        tracing::info!("Waiting for data to refresh...");

        let (control_ref, selection_ref) = (&control, &selection);
        let outcome = poll_until(self.clock, self.timings.refresh_policy(), move || {
            self.refresh_observed(control_ref, selection_ref)
        })
        .await;

        match outcome {
            WaitOutcome::Satisfied { attempts } => {
                if selection.prior_first_athlete.is_none() {
                    self.clock.sleep(Timings::ms(self.timings.no_signal_settle_ms)).await;
                }
                tracing::info!("Data refreshed successfully after {} polls", attempts);
                Ok(SelectionOutcome::Refreshed { attempts })
            }
            WaitOutcome::TimedOut { .. } => {
                tracing::warn!("Data may not have fully refreshed, continuing anyway...");
                self.clock.sleep(Timings::ms(self.timings.unconfirmed_settle_ms)).await;
                Ok(SelectionOutcome::Unconfirmed)
            }
        }
    }

    /// Prefers a combobox whose text names an event; otherwise the one under "Year".
    async fn locate_control(&self) -> Result<Option<(Locator, String)>> {
        let total = self.session.count(&self.selectors.combobox).await?;
        for index in 0..total {
            let candidate = Locator::nth(&self.selectors.combobox, index);
            let text = self.session.text(&candidate).await?.unwrap_or_default();
            if self.selectors.event_markers.iter().any(|m| text.contains(m.as_str())) {
                return Ok(Some((candidate, text)));
            }
        }

        let fallback = Locator::first(&self.selectors.year_combobox);
        Ok(self
            .session
            .text(&fallback)
            .await?
            .map(|text| (fallback, text)))
    }

    async fn first_athlete(&self) -> Option<String> {
        let locator = Locator::first(&self.selectors.first_athlete);
        match self.session.text(&locator).await {
            Ok(text) => text.filter(|t| !t.trim().is_empty()),
            Err(_) => None,
        }
    }

    async fn find_option(&self, label: &str) -> Result<Option<Locator>> {
        let total = self.session.count(&self.selectors.option).await?;
        tracing::debug!("Found {} options", total);
        for index in 0..total {
            let option = Locator::nth(&self.selectors.option, index);
            let text = self.session.text(&option).await?.unwrap_or_default();
            if contains_ignore_case(&text, label) {
                tracing::debug!("Clicking option: '{}'", text);
                return Ok(Some(option));
            }
        }
        Ok(None)
    }

    /// Text of the event dropdown, re-queried under "Year" on every call since
    /// the toolbar may re-render its comboboxes in a different order.
    async fn shown_label(&self, discovered: &Locator) -> Option<String> {
        let year = Locator::first(&self.selectors.year_combobox);
        match self.session.text(&year).await {
            Ok(Some(text)) => Some(text),
            _ => self.session.text(discovered).await.ok().flatten(),
        }
    }

    async fn refresh_observed(&self, control: &Locator, selection: &EventSelection) -> bool {
        let Some(shown) = self.shown_label(control).await else {
            return false;
        };
        if !contains_ignore_case(&shown, &selection.label) {
            return false;
        }

        match &selection.prior_first_athlete {
            Some(before) => match self.first_athlete().await {
                Some(after) if &after != before => {
                    tracing::debug!("First athlete after: '{}'", after);
                    true
                }
                _ => false,
            },
            None => true,
        }
    }
}
