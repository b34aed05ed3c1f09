use tracing::trace;

use crate::model::Record;

use super::Session;

impl Record {
    /// Attach `session` to this record and to every record reachable through
    /// already-resolved relationships. A record keeps the first session it
    /// was bound to; binding again is a no-op for it. Performs no queries.
    pub fn bind(&mut self, session: &Session) -> &mut Self {
        if self.session.is_none() {
            self.session = Some(session.clone());
        }
        self.propagate_session();
        self
    }

    /// Push this record's session down to unbound records in its cache
    pub(crate) fn propagate_session(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };

        let mut pending: Vec<&mut Record> = self
            .relations
            .values_mut()
            .flat_map(|cached| cached.records_mut().iter_mut())
            .collect();
        let mut bound = 0usize;

        while let Some(record) = pending.pop() {
            if record.session.is_none() {
                record.session = Some(session.clone());
                bound += 1;
            }
            pending.extend(
                record
                    .relations
                    .values_mut()
                    .flat_map(|cached| cached.records_mut().iter_mut()),
            );
        }

        if bound > 0 {
            trace!(
                session = %session.id(),
                entity = self.type_name(),
                record = %self.identity(),
                bound,
                "propagated session to nested records"
            );
        }
    }
}
