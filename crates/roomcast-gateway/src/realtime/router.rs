//! Message routing: recipient selection + delivery.
//!
//! Every fan-out snapshots `(id, handle)` pairs under the hub's read lock,
//! releases it, then delivers. A concurrent close during delivery therefore
//! cannot disturb iteration, and a slow transport never blocks registry
//! mutations. A recipient that fails is logged, counted, recorded in the
//! returned [`FanoutReport`], and skipped; the rest of the fan-out proceeds.

use std::time::Instant;

use serde_json::{Map, Value};

use roomcast_core::{ConnectionId, Result, RoomcastError};

use crate::realtime::connection::{ConnHandle, Connection, DeliveryError};
use crate::realtime::hub::Hub;
use crate::realtime::types::Payload;

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Recipients delivery was attempted on.
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<(ConnectionId, RoomcastError)>,
}

impl FanoutReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures caused by a connection lacking a delivery capability.
    pub fn hard_faults(&self) -> impl Iterator<Item = &(ConnectionId, RoomcastError)> {
        self.failures.iter().filter(|(_, e)| e.is_hard_fault())
    }
}

/// Deliver one payload to one connection.
///
/// Fails with `NoDeliveryCapability` when the connection exposes no
/// [`Deliverable`](crate::realtime::connection::Deliverable) sink.
pub fn deliver(id: ConnectionId, conn: &dyn Connection, payload: Payload) -> Result<()> {
    let sink = conn
        .deliverable()
        .ok_or(RoomcastError::NoDeliveryCapability(id))?;
    sink.deliver(payload).map_err(|e| match e {
        DeliveryError::QueueFull => RoomcastError::QueueFull(id),
        DeliveryError::Closed => RoomcastError::ChannelClosed(id),
    })
}

/// "Empty" in the loose sense: null, false, 0, "", "0", [] or {}.
fn is_empty_value(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty() || s == "0",
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

impl Hub {
    fn fan_out(&self, op: &'static str, recipients: Vec<(ConnectionId, ConnHandle)>, payload: &Payload) -> FanoutReport {
        let started = Instant::now();
        let mut report = FanoutReport::default();
        for (id, handle) in recipients {
            report.attempted += 1;
            let result = deliver(id, handle.as_ref(), payload.clone());
            self.record_delivery(op, id, result, &mut report);
        }
        self.metrics.fanout_duration.observe(&[("op", op)], started.elapsed());
        tracing::debug!(op, attempted = report.attempted, delivered = report.delivered, "fan-out");
        report
    }

    fn record_delivery(&self, op: &'static str, id: ConnectionId, result: Result<()>, report: &mut FanoutReport) {
        match result {
            Ok(()) => {
                report.delivered += 1;
                self.metrics.deliveries.inc(&[("op", op), ("outcome", "ok")]);
            }
            Err(e) => {
                let code = e.code().as_str();
                if e.is_hard_fault() {
                    tracing::error!(conn = %id, op, code, "delivery hard fault");
                } else {
                    tracing::warn!(conn = %id, op, code, error = %e, "delivery failed");
                }
                self.metrics.deliveries.inc(&[("op", op), ("outcome", code)]);
                report.failures.push((id, e));
            }
        }
    }

    /// Send to one connection. `Ok(false)` when the id is not registered;
    /// delivery errors propagate.
    pub fn send_to_connection(&self, id: &ConnectionId, payload: Payload) -> Result<bool> {
        let Some(handle) = self.state.read().registry.handle(id) else {
            return Ok(false);
        };
        let result = deliver(*id, handle.as_ref(), payload);
        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => e.code().as_str(),
        };
        self.metrics.deliveries.inc(&[("op", "connection"), ("outcome", outcome)]);
        result.map(|()| true)
    }

    /// Send to every connection bound to `identity`, minus `exclude_ids`.
    pub fn send_to_identity(&self, identity: &str, payload: Payload, exclude_ids: &[ConnectionId]) -> FanoutReport {
        let recipients = {
            let st = self.state.read();
            st.identities
                .connections_of(identity)
                .into_iter()
                .filter(|id| !exclude_ids.contains(id))
                .filter_map(|id| st.registry.handle(&id).map(|h| (id, h)))
                .collect()
        };
        self.fan_out("identity", recipients, &payload)
    }

    /// Identity-or-connection convenience: when `identity` is given the
    /// message goes to all of its connections (minus `exclude_ids`),
    /// otherwise to `id` alone.
    pub fn send_to_client(
        &self,
        id: &ConnectionId,
        payload: Payload,
        identity: Option<&str>,
        exclude_ids: &[ConnectionId],
    ) -> FanoutReport {
        if let Some(identity) = identity {
            return self.send_to_identity(identity, payload, exclude_ids);
        }
        let mut report = FanoutReport::default();
        let Some(handle) = self.state.read().registry.handle(id) else {
            return report;
        };
        report.attempted = 1;
        let result = deliver(*id, handle.as_ref(), payload);
        self.record_delivery("connection", *id, result, &mut report);
        report
    }

    /// Send to every member of `group` that is neither listed in
    /// `exclude_ids` nor bound to an identity in `exclude_identities`.
    pub fn send_to_group(
        &self,
        group: &str,
        payload: Payload,
        exclude_identities: &[&str],
        exclude_ids: &[ConnectionId],
    ) -> FanoutReport {
        let recipients = {
            let st = self.state.read();
            st.groups
                .members_of(group)
                .into_iter()
                .filter(|id| !exclude_ids.contains(id))
                .filter(|id| {
                    st.identities
                        .identity_of(id)
                        .is_none_or(|identity| !exclude_identities.contains(&identity))
                })
                .filter_map(|id| st.registry.handle(&id).map(|h| (id, h)))
                .collect()
        };
        self.fan_out("group", recipients, &payload)
    }

    /// Send to every registered connection except `exclude_ids`.
    pub fn broadcast(&self, payload: Payload, exclude_ids: &[ConnectionId]) -> FanoutReport {
        let recipients = {
            let st = self.state.read();
            st.registry
                .iter()
                .filter(|(id, _)| !exclude_ids.contains(id))
                .map(|(id, entry)| (*id, entry.handle.clone()))
                .collect()
        };
        self.fan_out("broadcast", recipients, &payload)
    }

    /// For every group, deliver to exactly one uniformly chosen member.
    pub fn broadcast_once_per_group(&self, payload: Payload) -> FanoutReport {
        let recipients = {
            let st = self.state.read();
            let mut rng = rand::rng();
            st.groups
                .group_ids()
                .iter()
                .filter_map(|group| st.groups.random_member(group, &mut rng))
                .filter_map(|id| st.registry.handle(&id).map(|h| (id, h)))
                .collect()
        };
        self.fan_out("once_per_group", recipients, &payload)
    }

    /// Deliver to one uniformly chosen member of `group` (nobody if the group
    /// does not exist).
    pub fn broadcast_once_to_group(&self, group: &str, payload: Payload) -> FanoutReport {
        let recipients = {
            let st = self.state.read();
            st.groups
                .random_member(group, &mut rand::rng())
                .and_then(|id| st.registry.handle(&id).map(|h| (id, h)))
                .into_iter()
                .collect()
        };
        self.fan_out("once_to_group", recipients, &payload)
    }

    /// Deliver to one uniformly chosen registered connection. `Ok(false)`
    /// when the registry is empty.
    pub fn send_to_random(&self, payload: Payload) -> Result<bool> {
        let Some((id, handle)) = self.state.read().registry.random(&mut rand::rng()) else {
            return Ok(false);
        };
        let result = deliver(id, handle.as_ref(), payload);
        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => e.code().as_str(),
        };
        self.metrics.deliveries.inc(&[("op", "random"), ("outcome", outcome)]);
        result.map(|()| true)
    }

    /// Collect per-connection data into a single observer.
    ///
    /// Selects registered connections by their bound identity: those bound to
    /// an identity in `exclude_identities` are skipped, and when
    /// `only_identities` is non-empty only connections bound to one of those
    /// identities are kept. For each selected connection, `target` receives a
    /// copy of `base`; if `base` has no meaningful `data` field it is filled
    /// with that connection's stored data (null when none).
    pub fn relay_with_enrichment(
        &self,
        target: &ConnHandle,
        base: &Map<String, Value>,
        exclude_identities: &[&str],
        only_identities: &[&str],
    ) -> FanoutReport {
        let enrich = is_empty_value(base.get("data"));
        let payloads: Vec<Payload> = {
            let st = self.state.read();
            st.registry
                .iter()
                .filter(|(id, _)| {
                    let identity = st.identities.identity_of(id);
                    let excluded = identity.is_some_and(|u| exclude_identities.contains(&u));
                    let included = only_identities.is_empty()
                        || identity.is_some_and(|u| only_identities.contains(&u));
                    !excluded && included
                })
                .map(|(_, entry)| {
                    let mut msg = base.clone();
                    if enrich {
                        msg.insert("data".to_string(), entry.data.clone().unwrap_or(Value::Null));
                    }
                    Payload::Json(Value::Object(msg))
                })
                .collect()
        };

        let target_id = target.id_slot().get().unwrap_or(ConnectionId::NIL);
        let started = Instant::now();
        let mut report = FanoutReport::default();
        for payload in payloads {
            report.attempted += 1;
            let result = deliver(target_id, target.as_ref(), payload);
            self.record_delivery("relay", target_id, result, &mut report);
        }
        self.metrics.fanout_duration.observe(&[("op", "relay")], started.elapsed());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loose_emptiness() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&json!(null))));
        assert!(is_empty_value(Some(&json!(0))));
        assert!(is_empty_value(Some(&json!("0"))));
        assert!(is_empty_value(Some(&json!([]))));
        assert!(is_empty_value(Some(&json!({}))));
        assert!(!is_empty_value(Some(&json!({"k": 1}))));
        assert!(!is_empty_value(Some(&json!("x"))));
        assert!(!is_empty_value(Some(&json!(true))));
    }
}
