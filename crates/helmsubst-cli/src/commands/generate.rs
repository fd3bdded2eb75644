use anyhow::Context;
use helmsubst_core::AmbientContext;
use helmsubst_core::envsubst::substitute;
use std::io::{IsTerminal, Read, Write};

/// Filter stdin through placeholder substitution.
pub fn generate() -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        anyhow::bail!("generate reads manifests from stdin; pipe input into it");
    }

    let mut input = Vec::new();
    stdin
        .lock()
        .read_to_end(&mut input)
        .context("reading stdin")?;

    let context = AmbientContext::capture();
    let output = substitute(
        &input,
        context
            .environment
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output).context("writing stdout")?;
    stdout.flush().context("writing stdout")?;
    Ok(())
}
