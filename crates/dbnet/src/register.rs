// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Long-lived handles to remote matrix registers.
//!
//! A `Register` owns the batch plan for one register and a cache of the
//! last successfully read value. `update()` runs every sub-read into a
//! scratch matrix and only replaces the cache when the whole batch
//! sequence succeeded, so a mid-batch failure never leaves a half-written
//! value behind.
//!
//! Handles share one [`Client`] through an `Arc<Mutex<_>>`; the lock
//! serializes transfers so concurrent handles cannot interleave
//! transaction ids on the wire.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::batch::BatchPlan;
use crate::client::{Client, TransferError};
use crate::registers::{
    Matrix, ReadRequest, ReadResponse, RegisterError, RegisterType, READ_REQUEST_MSG_ID,
};

/// Error from a register update.
#[derive(Debug)]
pub enum UpdateError {
    /// Type descriptor, planning, or codec failure.
    Register(RegisterError),
    /// The underlying transfer failed.
    Transfer(TransferError),
    /// The peer answered without a payload.
    EmptyReply,
}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(err) => write!(f, "{err}"),
            Self::Transfer(err) => write!(f, "{err}"),
            Self::EmptyReply => write!(f, "reply carried no payload"),
        }
    }
}

impl std::error::Error for UpdateError {}

impl From<RegisterError> for UpdateError {
    fn from(err: RegisterError) -> Self {
        Self::Register(err)
    }
}

impl From<TransferError> for UpdateError {
    fn from(err: TransferError) -> Self {
        Self::Transfer(err)
    }
}

/// Handle to one remote matrix register.
pub struct Register {
    client: Arc<Mutex<Client>>,
    register_id: u16,
    ty: RegisterType,
    rows: u16,
    cols: u16,
    plan: BatchPlan,
    auto_update: bool,
    value: Option<Matrix>,
}

impl Register {
    /// Create a handle for `register_id` with the given type descriptor
    /// (must name a matrix type, e.g. `"MF[25,1]"`).
    pub fn new(
        client: Arc<Mutex<Client>>,
        register_id: u16,
        descriptor: &str,
    ) -> Result<Self, RegisterError> {
        let ty = RegisterType::parse(descriptor)?;
        let Some((rows, cols)) = ty.shape else {
            return Err(RegisterError::UnsupportedType);
        };
        let plan = BatchPlan::new(rows, cols, ty.kind.size())?;

        Ok(Self {
            client,
            register_id,
            ty,
            rows,
            cols,
            plan,
            auto_update: false,
            value: None,
        })
    }

    /// Refresh the value on every [`Self::value`] call.
    pub fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
    }

    /// Register identifier.
    #[must_use]
    pub fn register_id(&self) -> u16 {
        self.register_id
    }

    /// Full register type.
    #[must_use]
    pub fn register_type(&self) -> RegisterType {
        self.ty
    }

    /// Last successfully read value, if any.
    #[must_use]
    pub fn cached(&self) -> Option<&Matrix> {
        self.value.as_ref()
    }

    /// The cached value, refreshed first when auto-update is on.
    pub fn value(&mut self) -> Result<Option<&Matrix>, UpdateError> {
        if self.auto_update {
            self.update()?;
        }
        Ok(self.value.as_ref())
    }

    /// Read the whole register and replace the cached value.
    ///
    /// Sub-reads run sequentially in span order. On any failure the
    /// previous cached value is left untouched.
    pub fn update(&mut self) -> Result<&Matrix, UpdateError> {
        let mut scratch = Matrix::zeroed(self.ty.kind, self.rows, self.cols);

        for span in self.plan.spans() {
            let request = ReadRequest::new(
                self.register_id,
                self.ty,
                span.row_offset,
                span.col_offset,
                span.rows,
                span.cols,
            )?;
            let encoded = request.encode();

            let (_, payload) = self
                .client
                .lock()
                .transfer(READ_REQUEST_MSG_ID, Some(&encoded))?;
            let payload = payload.ok_or(UpdateError::EmptyReply)?;

            let response = ReadResponse::decode(&payload, &request)?;
            span.place(&response.values, &mut scratch)?;
        }

        log::debug!(
            "register {} ({}) updated in {} batches",
            self.register_id,
            self.ty,
            self.plan.spans().len()
        );
        Ok(self.value.insert(scratch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    use crate::config::ClientConfig;
    use crate::envelope::Envelope;
    use crate::frame::Frame;
    use crate::link::Link;
    use crate::registers::Values;

    /// Link backed by a table of register contents, answering read
    /// requests like a remote station would.
    struct StationLink {
        matrix: Mutex<Values>,
        cols: u16,
        /// Spans served so far, for asserting batch structure.
        served: Arc<Mutex<Vec<(u16, u16, u16, u16)>>>,
        /// Fail the nth request (1-based) with silence when set.
        fail_request: Option<u32>,
        requests: Mutex<u32>,
        inbound: Mutex<VecDeque<Vec<u8>>>,
    }

    impl StationLink {
        fn new(matrix: Values, cols: u16, fail_request: Option<u32>) -> Self {
            Self {
                matrix: Mutex::new(matrix),
                cols,
                served: Arc::new(Mutex::new(Vec::new())),
                fail_request,
                requests: Mutex::new(0),
                inbound: Mutex::new(VecDeque::new()),
            }
        }

        fn served(&self) -> Arc<Mutex<Vec<(u16, u16, u16, u16)>>> {
            Arc::clone(&self.served)
        }

        fn block(&self, request: &ReadRequest) -> Values {
            let matrix = self.matrix.lock();
            let mut out = Values::zeroed(matrix.kind(), 0);
            for i in 0..request.rows {
                for j in 0..request.cols {
                    let idx = usize::from(request.row_offset + i) * usize::from(self.cols)
                        + usize::from(request.col_offset + j);
                    match (&*matrix, &mut out) {
                        (Values::U16(m), Values::U16(o)) => o.push(m[idx]),
                        (Values::U32(m), Values::U32(o)) => o.push(m[idx]),
                        (Values::F32(m), Values::F32(o)) => o.push(m[idx]),
                        _ => unreachable!(),
                    }
                }
            }
            out
        }
    }

    impl Link for StationLink {
        fn send(&self, datagram: &[u8]) -> io::Result<()> {
            *self.requests.lock() += 1;
            if Some(*self.requests.lock()) == self.fail_request {
                return Ok(());
            }

            let envelope = Envelope::decode(datagram, None).expect("request decodes");
            let frame = envelope.frame.expect("request has a frame");
            let request =
                ReadRequest::decode(frame.payload.as_deref().expect("request payload"))
                    .expect("request parses");
            self.served.lock().push((
                request.row_offset,
                request.col_offset,
                request.rows,
                request.cols,
            ));

            let body = ReadResponse::encode(&self.block(&request));
            let reply_frame = Frame::new(frame.dest, frame.source, 0, body);
            let reply = Envelope::new(envelope.transaction_id, 0x1111_2222, reply_frame)
                .encode(None)
                .expect("reply encodes");
            self.inbound.lock().push_back(reply);
            Ok(())
        }

        fn recv_timeout(&self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
            match self.inbound.lock().pop_front() {
                Some(datagram) => {
                    let len = datagram.len().min(buf.len());
                    buf[..len].copy_from_slice(&datagram[..len]);
                    Ok(len)
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "dropped")),
            }
        }
    }

    fn client_over(link: StationLink) -> Arc<Mutex<Client>> {
        let config = ClientConfig {
            dest_addr: 4,
            timeout: Duration::from_millis(5),
            max_tries: 1,
            ..ClientConfig::default()
        };
        Arc::new(Mutex::new(Client::with_link(config, Box::new(link))))
    }

    #[test]
    fn test_single_batch_update() {
        let values = Values::F32((0..25).map(|i| i as f32 * 0.5).collect());
        let client = client_over(StationLink::new(values.clone(), 1, None));

        let mut register = Register::new(client, 4112, "MF[25,1]").expect("register");
        let matrix = register.update().expect("update");
        assert_eq!(matrix.rows, 25);
        assert_eq!(matrix.cols, 1);
        assert_eq!(matrix.values, values);
    }

    #[test]
    fn test_multi_batch_update_reassembles() {
        // 30x2 f32 splits into 29 + 1 rows; the reassembled matrix must
        // equal the station's table element for element.
        let values = Values::F32((0..60).map(|i| i as f32).collect());
        let client = client_over(StationLink::new(values.clone(), 2, None));

        let mut register = Register::new(client, 4112, "MF[30,2]").expect("register");
        let matrix = register.update().expect("update");
        assert_eq!(matrix.values, values);
    }

    #[test]
    fn test_failed_batch_keeps_previous_value() {
        // 60x2 u16 needs two sub-reads (59 + 1 rows); failing the second
        // one must leave the previously cached value untouched.
        let link = StationLink::new(Values::U16((0..120).collect()), 2, None);
        let client = client_over(link);
        let mut register = Register::new(client, 7, "MI[60,2]").expect("register");
        let first = register.update().expect("update").clone();

        let failing = StationLink::new(Values::U16((1000..1120).collect()), 2, Some(2));
        let client = client_over(failing);
        let mut register2 = Register::new(client, 7, "MI[60,2]").expect("register");
        register2.value = Some(first.clone());

        assert!(matches!(
            register2.update(),
            Err(UpdateError::Transfer(TransferError::Failed(_)))
        ));
        assert_eq!(register2.cached(), Some(&first), "cache must stay intact");
    }

    #[test]
    fn test_rejects_scalar_descriptor() {
        let link = StationLink::new(Values::U16(vec![]), 1, None);
        let client = client_over(link);
        assert!(matches!(
            Register::new(client, 1, "F"),
            Err(RegisterError::UnsupportedType)
        ));
    }

    #[test]
    fn test_rejects_unplannable_matrix() {
        let link = StationLink::new(Values::F32(vec![]), 1, None);
        let client = client_over(link);
        assert!(matches!(
            Register::new(client, 1, "MF[100,100]"),
            Err(RegisterError::MatrixTooLarge)
        ));
    }

    #[test]
    fn test_auto_update() {
        let values = Values::U16((0..32).collect());
        let client = client_over(StationLink::new(values.clone(), 32, None));

        let mut register = Register::new(client, 4082, "MI[1,32]").expect("register");
        assert!(register.value().expect("value").is_none());

        register.set_auto_update(true);
        let matrix = register.value().expect("value").expect("present");
        assert_eq!(matrix.values, values);
    }

    #[test]
    fn test_served_spans_match_plan() {
        let link = StationLink::new(Values::F32((0..60).map(|i| i as f32).collect()), 2, None);
        let served = link.served();
        let client = client_over(link);

        let mut register = Register::new(client, 4112, "MF[30,2]").expect("register");
        register.update().expect("update");

        assert_eq!(*served.lock(), [(0, 0, 29, 2), (29, 0, 1, 2)]);
    }
}
