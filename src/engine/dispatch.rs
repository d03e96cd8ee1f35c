//! Per-event routing: button handling, modifier edges, resolution, dispatch

use tracing::{debug, trace, warn};

use super::buttons::ButtonChange;
use super::modifier::{ModifierContext, Transition};
use super::overrides::EvalContext;
use super::transform::scale;
use super::types::ControlEvent;
use super::{RouteError, RouteOutcome};

impl super::Engine {
    /// Process one control event to completion
    pub fn handle_event(&mut self, event: ControlEvent) -> RouteOutcome {
        trace!("→ {}", event);
        let is_button = self.is_button(event.id);

        if is_button {
            let external = self.options.external_indicator;
            // Indicator mode: anything but a full press pulse is an ordinary
            // mapped event and never touches button state
            if external && event.value != 127 {
                return self.route(event, true);
            }

            let mut changes = self.state.buttons.update(event.id, event.value, external);
            // Selector settings may have moved a modifier onto this button
            // since its last edge, so its level is fed even when unchanged
            if !changes.iter().any(|c| c.id == event.id) {
                changes.push(ButtonChange {
                    id: event.id,
                    on: self.state.buttons.is_on(event.id),
                });
            }
            self.apply_button_changes(&changes);

            if !self.options.buttons_dispatch {
                return RouteOutcome::Consumed;
            }
        }

        self.route(event, is_button)
    }

    /// Feed button levels to the modifiers they currently trigger. Only
    /// modifier edges change the table.
    fn apply_button_changes(&mut self, changes: &[ButtonChange]) {
        for change in changes {
            let triggered = self.modifiers.triggered_by(change.id, &self.settings);
            if triggered.is_empty() {
                continue;
            }

            let mut ctx = ModifierContext {
                catalog: &self.catalog,
                table: &mut self.state.table,
                buttons: &self.state.buttons,
                settings: &self.settings,
                host: self.host.as_ref(),
            };
            for index in triggered {
                match self.modifiers.set_level(index, change.on, &mut ctx) {
                    Transition::Activated => debug!("Modifier {} on ({})", index, change.id),
                    Transition::Deactivated => debug!("Modifier {} off ({})", index, change.id),
                    Transition::Unchanged => {}
                }
            }
        }
    }

    /// Resolve the active target, apply overrides and hand the value to the host
    fn route(&self, event: ControlEvent, is_button: bool) -> RouteOutcome {
        let id = event.id;

        let Some(resolved) = self.state.table.current_target(id) else {
            if self.state.table.is_initialized(id) {
                let reason = RouteError::EmptyMappingStack(id);
                warn!("{}", reason);
                return RouteOutcome::Dropped {
                    reason,
                    forwarded_raw: false,
                };
            }
            debug!("{}, passing through", RouteError::UnknownControl(id));
            self.host.forward_raw(&event.encode());
            return RouteOutcome::Forwarded;
        };

        let ctx = EvalContext {
            catalog: &self.catalog,
            buttons: &self.state.buttons,
            settings: &self.settings,
        };

        let mut target = self
            .overrides
            .rename(id, resolved, &ctx)
            .unwrap_or_else(|| resolved.to_string());
        if target != resolved {
            debug!("{} renamed to {}", resolved, target);
        }

        let custom = self.overrides.math(id, &target, event.value, &ctx);

        if let Some(synced) = self.overrides.sync_rename(&target, &ctx, self.host.as_ref()) {
            debug!("{} rerouted to {}", target, synced);
            target = synced;
        }

        let value = custom.unwrap_or_else(|| {
            if is_button {
                if self.state.buttons.is_on(id) {
                    1.0
                } else {
                    0.0
                }
            } else {
                scale(event.value)
            }
        });

        let forwarded_raw = self.forwards_raw();
        let outcome = if self.host.is_target_addressable(&target) {
            self.host.dispatch(&target, value);
            RouteOutcome::Dispatched {
                target,
                value,
                forwarded_raw,
            }
        } else {
            let reason = RouteError::UnaddressableTarget(target);
            debug!("{} ({}), dropped", reason, self.catalog.label(id));
            RouteOutcome::Dropped {
                reason,
                forwarded_raw,
            }
        };

        if forwarded_raw {
            self.host.forward_raw(&event.encode());
        }
        outcome
    }
}
