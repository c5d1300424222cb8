use fpwalk::{BacktraceReporter, DladdrSymbolizer, StderrWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[no_mangle]
#[inline(never)]
pub extern "C" fn fun_stack() {
    let backtrace = fpwalk::capture();
    for entry in &backtrace {
        tracing::info!(
            "fp={:#x} ra={:#x}",
            entry.frame_pointer,
            entry.return_address
        );
    }
    BacktraceReporter::new(DladdrSymbolizer, StderrWriter).report(&backtrace);
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn fun_inner() {
    fun_stack();
    std::hint::black_box(());
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn fun_outer() {
    fun_inner();
    std::hint::black_box(());
}

fn main() {
    let registry = tracing_subscriber::Registry::default().with(
        EnvFilter::builder()
            .with_default_directive(tracing::Level::TRACE.into())
            .from_env()
            .unwrap(),
    );

    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    registry.with(tree_layer).init();

    fun_outer();
}
