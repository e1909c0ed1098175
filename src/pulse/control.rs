//! PulseAudio implementation of the sound-server binding.
//!
//! libpulse's API is blocking mainloop iteration, so every operation creates
//! a controller on a blocking worker thread and runs to completion there.
//! Defaults go through the pulsectl controllers; card profiles go through the
//! controller handler's introspector, since only cards know their operating
//! mode.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use libpulse_binding::callbacks::ListResult;
use pulsectl::controllers::{DeviceControl, SinkController, SourceController};
use tracing::debug;

use super::server::SoundServer;

#[derive(Debug, Clone, Copy, Default)]
pub struct PulseControl;

impl PulseControl {
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("sound-server worker failed: {e}"))?
}

fn sink_controller() -> Result<SinkController> {
    SinkController::create().map_err(|e| anyhow!("could not connect to the sound server: {e}"))
}

fn source_controller() -> Result<SourceController> {
    SourceController::create().map_err(|e| anyhow!("could not connect to the sound server: {e}"))
}

fn card_profile_blocking(card: &str) -> Result<Option<String>> {
    let mut controller = sink_controller()?;

    let found = Rc::new(RefCell::new(None::<String>));
    let operation = {
        let found = found.clone();
        controller
            .handler
            .introspect
            .get_card_info_by_name(card, move |result| {
                if let ListResult::Item(info) = result {
                    *found.borrow_mut() = info
                        .active_profile
                        .as_ref()
                        .and_then(|p| p.name.as_ref().map(|n| n.to_string()));
                }
            })
    };

    // an unknown card cancels the operation; that simply means the card is
    // not realized yet
    if controller.handler.wait_for_operation(operation).is_err() {
        return Ok(None);
    }

    let profile = found.borrow().clone();
    Ok(profile)
}

fn set_card_profile_blocking(card: &str, profile: &str) -> Result<()> {
    let mut controller = sink_controller()?;

    let accepted = Rc::new(RefCell::new(false));
    let operation = {
        let accepted = accepted.clone();
        controller.handler.introspect.set_card_profile_by_name(
            card,
            profile,
            Some(Box::new(move |success| {
                *accepted.borrow_mut() = success;
            })),
        )
    };

    controller
        .handler
        .wait_for_operation(operation)
        .map_err(|e| anyhow!("profile change on '{card}' did not complete: {e}"))?;

    if !*accepted.borrow() {
        bail!("sound server refused profile '{profile}' for card '{card}'");
    }
    Ok(())
}

#[async_trait]
impl SoundServer for PulseControl {
    async fn default_sink(&self) -> Result<String> {
        blocking(|| {
            let mut controller = sink_controller()?;
            let info = controller
                .get_server_info()
                .map_err(|e| anyhow!("could not read server info: {e}"))?;
            info.default_sink_name
                .ok_or_else(|| anyhow!("sound server reports no default sink"))
        })
        .await
    }

    async fn default_source(&self) -> Result<String> {
        blocking(|| {
            let mut controller = source_controller()?;
            let info = controller
                .get_server_info()
                .map_err(|e| anyhow!("could not read server info: {e}"))?;
            info.default_source_name
                .ok_or_else(|| anyhow!("sound server reports no default source"))
        })
        .await
    }

    async fn set_default_sink(&self, name: &str) -> Result<()> {
        let name = name.to_owned();
        blocking(move || {
            debug!("Setting default sink to {}", name);
            let mut controller = sink_controller()?;
            let accepted = controller
                .set_default_device(&name)
                .map_err(|e| anyhow!("could not set default sink '{name}': {e}"))?;
            if !accepted {
                bail!("sound server refused default sink '{name}'");
            }
            Ok(())
        })
        .await
    }

    async fn set_default_source(&self, name: &str) -> Result<()> {
        let name = name.to_owned();
        blocking(move || {
            debug!("Setting default source to {}", name);
            let mut controller = source_controller()?;
            let accepted = controller
                .set_default_device(&name)
                .map_err(|e| anyhow!("could not set default source '{name}': {e}"))?;
            if !accepted {
                bail!("sound server refused default source '{name}'");
            }
            Ok(())
        })
        .await
    }

    async fn profile(&self, card: &str) -> Result<Option<String>> {
        let card = card.to_owned();
        blocking(move || card_profile_blocking(&card)).await
    }

    async fn set_profile(&self, card: &str, profile: &str) -> Result<()> {
        let card = card.to_owned();
        let profile = profile.to_owned();
        blocking(move || {
            debug!("Setting profile of {} to {}", card, profile);
            set_card_profile_blocking(&card, &profile)
        })
        .await
    }
}
