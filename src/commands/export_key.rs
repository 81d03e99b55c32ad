use super::AppContext;
use crate::cli::ExportKeyArgs;

pub fn run_export_key(ctx: &AppContext, args: ExportKeyArgs) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let service = ctx.service()?;
    let info = service.vault().get(&caller, &args.id)?;

    let protector = super::protector_for(&service, &info.protection)?;
    let pem = service
        .vault()
        .export_private_key(&caller, &args.id, &protector)?;
    super::emit_private_key(&pem, args.out.as_deref())
}
