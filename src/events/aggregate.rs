// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// 1. Commands are validated against current state before emitting events
// 2. Events describe facts; applying them is the only way state changes
// 3. The aggregate never performs I/O; side effects implied by an event are
//    carried out by the caller inside its transaction
//
// ============================================================================

pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Decide which events a command produces (business rules live here).
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Fold an event into current state.
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    fn aggregate_id(&self) -> i64;

    /// Number of events applied so far.
    fn version(&self) -> i64;

    /// Handle a command and apply the resulting events in order.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = self.handle_command(command)?;
        for event in &events {
            self.apply_event(event)?;
        }
        Ok(events)
    }
}
