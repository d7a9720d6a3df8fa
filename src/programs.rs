use crate::backend::{BackendError, GpuBackend, Program, ProgramHandle};

#[derive(Clone, Debug, PartialEq)]
pub struct Programs {
    handles: Vec<ProgramHandle>,
}

impl Programs {
    pub fn compile_all<B: GpuBackend>(backend: &mut B) -> Result<Self, BackendError> {
        let handles = Program::ALL
            .iter()
            .map(|program| {
                log::debug!("compiling {program} program");
                backend.compile_program(*program)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { handles })
    }

    pub fn get(&self, program: Program) -> ProgramHandle {
        self.handles[program.index()]
    }
}
