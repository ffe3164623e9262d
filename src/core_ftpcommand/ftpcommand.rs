#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    USER,
    PASS,
    SYST,
    PWD,
    TYPE,
    CWD,
    CDUP,
    SIZE,
    MDTM,
    DELE,
    RMD,
    MKD,
    RNFR,
    RNTO,
    PASV,
    EPSV,
    PORT,
    LIST,
    RETR,
    STOR,
    REST,
    ABOR,
    QUIT,
    FEAT,
    OPTS,
    MODE,
    STRU,
    NOOP,
    STAT,
}

impl FtpCommand {
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "SYST" => Some(FtpCommand::SYST),
            "PWD" | "XPWD" => Some(FtpCommand::PWD),
            "TYPE" => Some(FtpCommand::TYPE),
            "CWD" | "XCWD" => Some(FtpCommand::CWD),
            "CDUP" | "XCUP" => Some(FtpCommand::CDUP),
            "SIZE" => Some(FtpCommand::SIZE),
            "MDTM" => Some(FtpCommand::MDTM),
            "DELE" => Some(FtpCommand::DELE),
            "RMD" | "XRMD" => Some(FtpCommand::RMD),
            "MKD" | "XMKD" => Some(FtpCommand::MKD),
            "RNFR" => Some(FtpCommand::RNFR),
            "RNTO" => Some(FtpCommand::RNTO),
            "PASV" => Some(FtpCommand::PASV),
            "EPSV" => Some(FtpCommand::EPSV),
            "PORT" => Some(FtpCommand::PORT),
            "LIST" => Some(FtpCommand::LIST),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "REST" => Some(FtpCommand::REST),
            "ABOR" => Some(FtpCommand::ABOR),
            "QUIT" => Some(FtpCommand::QUIT),
            "FEAT" => Some(FtpCommand::FEAT),
            "OPTS" => Some(FtpCommand::OPTS),
            "MODE" => Some(FtpCommand::MODE),
            "STRU" => Some(FtpCommand::STRU),
            "NOOP" => Some(FtpCommand::NOOP),
            "STAT" => Some(FtpCommand::STAT),
            _ => None,
        }
    }
}
