use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_network::network::GatewayContext;
use crate::helpers::ControlWriter;
use crate::session::Session;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

// Specific crates for PORT, PASV and EPSV commands
use crate::core_network::pasv;
use crate::core_network::port;

pub type CommandHandler = Box<
    dyn Fn(
            ControlWriter,
            Arc<GatewayContext>,
            Arc<TokioMutex<Session>>,
            String, // Command argument
        ) -> Pin<Box<dyn Future<Output = Result<(), std::io::Error>> + Send>>
        + Send
        + Sync,
>;

pub fn initialize_command_handlers() -> HashMap<FtpCommand, Arc<CommandHandler>> {
    let mut handlers: HashMap<FtpCommand, Arc<CommandHandler>> = HashMap::new();

    handlers.insert(
        FtpCommand::USER,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::user::handle_user_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::PASS,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::pass::handle_pass_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::TYPE,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::type_::handle_type_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::CWD,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::cwd::handle_cwd_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::CDUP,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::cdup::handle_cdup_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::SIZE,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::size::handle_size_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::MDTM,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::mdtm::handle_mdtm_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::DELE,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::dele::handle_dele_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::RMD,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::rmd::handle_rmd_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::MKD,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::mkd::handle_mkd_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::RNFR,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::rnfr::handle_rnfr_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::RNTO,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::rnto::handle_rnto_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::LIST,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::list::handle_list_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::RETR,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::retr::handle_retr_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::STOR,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::stor::handle_stor_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::REST,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::rest::handle_rest_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::ABOR,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::abor::handle_abor_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::QUIT,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(crate::core_ftpcommand::quit::handle_quit_command(
                writer, ctx, session, arg,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::SYST,
        Arc::new(Box::new(|writer, _ctx, _session, _arg| {
            Box::pin(crate::core_ftpcommand::syst::handle_syst_command(writer))
        })),
    );

    handlers.insert(
        FtpCommand::PWD,
        Arc::new(Box::new(|writer, _ctx, session, _arg| {
            Box::pin(crate::core_ftpcommand::pwd::handle_pwd_command(
                writer, session,
            ))
        })),
    );

    handlers.insert(
        FtpCommand::FEAT,
        Arc::new(Box::new(|writer, _ctx, _session, _arg| {
            Box::pin(crate::core_ftpcommand::feat::handle_feat_command(writer))
        })),
    );

    handlers.insert(
        FtpCommand::PASV,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(pasv::handle_pasv_command(writer, ctx, session, arg))
        })),
    );

    handlers.insert(
        FtpCommand::EPSV,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(pasv::handle_epsv_command(writer, ctx, session, arg))
        })),
    );

    handlers.insert(
        FtpCommand::PORT,
        Arc::new(Box::new(|writer, ctx, session, arg| {
            Box::pin(port::handle_port_command(writer, ctx, session, arg))
        })),
    );

    // Acknowledged without effect.
    for command in [
        FtpCommand::NOOP,
        FtpCommand::OPTS,
        FtpCommand::MODE,
        FtpCommand::STRU,
        FtpCommand::STAT,
    ] {
        handlers.insert(
            command,
            Arc::new(Box::new(|writer, _ctx, _session, arg| {
                Box::pin(crate::core_ftpcommand::noop::handle_noop_command(
                    writer, arg,
                ))
            })),
        );
    }

    handlers
}
