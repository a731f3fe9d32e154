// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use capview_app::{Capture, DetailToken, DetailView, SortOrder};
use capview_client::Client;
use capview_store::CaptureStore;
use capview_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, info};

/// Lists from the local captures directory; detail and delete go through the
/// capture server when one is configured.
pub struct CaptureRuntime<'a> {
    store: &'a CaptureStore,
    client: Option<Client>,
}

impl<'a> CaptureRuntime<'a> {
    pub fn new(store: &'a CaptureStore, client: Option<Client>) -> Self {
        Self { store, client }
    }
}

impl capview_tui::AppRuntime for CaptureRuntime<'_> {
    fn load_captures(&mut self, order: SortOrder) -> Result<Vec<Capture>> {
        self.store.list(order)
    }

    fn captures_today(&mut self) -> Result<usize> {
        Ok(self.store.captures_today(self.store.now())?.len())
    }

    fn resolve_detail(&mut self, file_name: &str) -> Result<DetailView> {
        match &self.client {
            Some(client) => client.view_capture(file_name),
            None => self.store.resolve_detail(file_name),
        }
    }

    fn spawn_detail_request(
        &mut self,
        token: DetailToken,
        file_name: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let Some(client) = self.client.clone() else {
            let result = self
                .store
                .resolve_detail(file_name)
                .map_err(|error| error.to_string());
            tx.send(InternalEvent::Detail { token, result })
                .map_err(|_| anyhow!("detail event channel closed"))?;
            return Ok(());
        };

        let file_name = file_name.to_owned();
        thread::spawn(move || {
            let result = client
                .view_capture(&file_name)
                .map_err(|error| error.to_string());
            debug!(token = token.get(), file = %file_name, ok = result.is_ok(), "detail resolved");
            // The UI may have quit while the request was in flight.
            let _ = tx.send(InternalEvent::Detail { token, result });
        });
        Ok(())
    }

    fn delete_capture(&mut self, file_name: &str) -> Result<bool> {
        let Some(client) = &self.client else {
            return self.store.delete(file_name);
        };
        client.delete_capture(file_name)?;
        info!(file = file_name, server = client.base_url(), "capture deleted on server");
        Ok(true)
    }
}
