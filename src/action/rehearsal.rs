use anyhow::Result;

use crate::pool::Disposition;
use crate::roster::WorkOrder;

use super::template::CommandTemplate;
use super::BulkAction;

/// Logs the command each work order would get, running nothing.
///
/// This is what `drover run` does without `--apply`: same roster
/// validation, same template expansion, same report files, zero side
/// effects.
pub struct RehearsalAction {
    template: CommandTemplate,
}

impl RehearsalAction {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }
}

impl BulkAction<WorkOrder> for RehearsalAction {
    type Worker = ();

    fn init_worker(&self, _slot: usize) -> Result<()> {
        Ok(())
    }

    fn apply(&self, _worker: &mut (), order: &WorkOrder) -> Result<Disposition> {
        tracing::info!("would run {}", self.template.render_line(order.fields()));
        Ok(Disposition::Applied)
    }
}
