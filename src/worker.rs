use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::{error, info};

use crate::api::DefectApi;
use crate::workflow::{execute, Outcome, Request};

pub struct ApiWorker {
    requests: Sender<Request>,
    outcomes: Receiver<Outcome>,
}

impl ApiWorker {
    /// `notify` runs after every outcome is sent, typically to request a
    /// repaint.
    pub fn spawn(api: Box<dyn DefectApi>, notify: impl Fn() + Send + 'static) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (outcome_tx, outcome_rx) = mpsc::channel::<Outcome>();

        let spawned = thread::Builder::new()
            .name("qc-api".to_string())
            .spawn(move || {
                for request in request_rx {
                    for outcome in execute(api.as_ref(), request) {
                        if outcome_tx.send(outcome).is_err() {
                            return;
                        }
                    }
                    notify();
                }
                info!("API worker stopped");
            });
        if let Err(e) = spawned {
            error!("Failed to start API worker thread: {}", e);
        }

        Self {
            requests: request_tx,
            outcomes: outcome_rx,
        }
    }

    pub fn submit(&self, request: Request) {
        if self.requests.send(request).is_err() {
            error!("API worker is gone; request dropped");
        }
    }

    /// Outcomes that arrived since the last call, in completion order.
    pub fn drain(&self) -> Vec<Outcome> {
        self.outcomes.try_iter().collect()
    }
}
