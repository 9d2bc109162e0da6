// Copyright (C) 2021  Anthony DeDominic <adedomin@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! The full RFC 1459 numeric reply set (section 6), as `&str` rather than
//! an enum so building a reply line is a plain `format!` with no match arm
//! per code. `ReferenceDispatcher` only ever sends a handful of these; the
//! rest exist for an external reply formatter built on top of this crate.

pub const RPL_WELCOME: &str = "001";
pub const RPL_YOURHOST: &str = "002";
pub const RPL_CREATED: &str = "003";
pub const RPL_MYINFO: &str = "004";

// 6.2 Command responses
pub const RPL_TRACELINK: &str = "200";
pub const RPL_TRACECONNECTING: &str = "201";
pub const RPL_TRACEHANDSHAKE: &str = "202";
pub const RPL_TRACEUNKNOWN: &str = "203";
pub const RPL_TRACEOPERATOR: &str = "204";
pub const RPL_TRACEUSER: &str = "205";
pub const RPL_TRACESERVER: &str = "206";
pub const RPL_TRACENEWTYPE: &str = "208";
pub const RPL_STATSLINKINFO: &str = "211";
pub const RPL_STATSCOMMANDS: &str = "212";
pub const RPL_STATSCLINE: &str = "213";
pub const RPL_STATSNLINE: &str = "214";
pub const RPL_STATSILINE: &str = "215";
pub const RPL_STATSKLINE: &str = "216";
pub const RPL_STATSYLINE: &str = "218";
pub const RPL_ENDOFSTATS: &str = "219";
pub const RPL_UMODEIS: &str = "221";
pub const RPL_STATSLLINE: &str = "241";
pub const RPL_STATSUPTIME: &str = "242";
pub const RPL_STATSOLINE: &str = "243";
pub const RPL_STATSHLINE: &str = "244";
pub const RPL_LUSERCLIENT: &str = "251";
pub const RPL_LUSEROP: &str = "252";
pub const RPL_LUSERUNKNOWN: &str = "253";
pub const RPL_LUSERCHANNELS: &str = "254";
pub const RPL_LUSERME: &str = "255";
pub const RPL_ADMINME: &str = "256";
pub const RPL_ADMINLOC1: &str = "257";
pub const RPL_ADMINLOC2: &str = "258";
pub const RPL_ADMINEMAIL: &str = "259";
pub const RPL_TRACELOG: &str = "261";
pub const RPL_NONE: &str = "300";
pub const RPL_AWAY: &str = "301";
pub const RPL_USERHOST: &str = "302";
pub const RPL_ISON: &str = "303";
pub const RPL_UNAWAY: &str = "305";
pub const RPL_NOWAWAY: &str = "306";
pub const RPL_WHOISUSER: &str = "311";
pub const RPL_WHOISSERVER: &str = "312";
pub const RPL_WHOISOPERATOR: &str = "313";
pub const RPL_WHOWASUSER: &str = "314";
pub const RPL_ENDOFWHO: &str = "315";
pub const RPL_WHOISIDLE: &str = "317";
pub const RPL_ENDOFWHOIS: &str = "318";
pub const RPL_WHOISCHANNELS: &str = "319";
pub const RPL_LISTSTART: &str = "321";
pub const RPL_LIST: &str = "322";
pub const RPL_LISTEND: &str = "323";
pub const RPL_CHANNELMODEIS: &str = "324";
pub const RPL_NOTOPIC: &str = "331";
pub const RPL_TOPIC: &str = "332";
pub const RPL_INVITING: &str = "341";
pub const RPL_SUMMONING: &str = "342";
pub const RPL_VERSION: &str = "351";
pub const RPL_WHOREPLY: &str = "352";
pub const RPL_NAMREPLY: &str = "353";
pub const RPL_KILLDONE: &str = "361";
pub const RPL_CLOSING: &str = "362";
pub const RPL_CLOSEEND: &str = "363";
pub const RPL_LINKS: &str = "364";
pub const RPL_ENDOFLINKS: &str = "365";
pub const RPL_ENDOFNAMES: &str = "366";
pub const RPL_BANLIST: &str = "367";
pub const RPL_ENDOFBANLIST: &str = "368";
pub const RPL_ENDOFWHOWAS: &str = "369";
pub const RPL_INFO: &str = "371";
pub const RPL_MOTD: &str = "372";
pub const RPL_INFOSTART: &str = "373";
pub const RPL_ENDOFINFO: &str = "374";
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_ENDOFMOTD: &str = "376";
pub const RPL_YOUREOPER: &str = "381";
pub const RPL_REHASHING: &str = "382";
pub const RPL_MYPORTIS: &str = "384";
pub const RPL_TIME: &str = "391";
pub const RPL_USERSSTART: &str = "392";
pub const RPL_USERS: &str = "393";
pub const RPL_ENDOFUSERS: &str = "394";
pub const RPL_NOUSERS: &str = "395";

// 6.1 Error replies
pub const ERR_NOSUCHNICK: &str = "401";
pub const ERR_NOSUCHSERVER: &str = "402";
pub const ERR_NOSUCHCHANNEL: &str = "403";
pub const ERR_CANNOTSENDTOCHAN: &str = "404";
pub const ERR_TOOMANYCHANNELS: &str = "405";
pub const ERR_WASNOSUCHNICK: &str = "406";
pub const ERR_TOOMANYTARGETS: &str = "407";
pub const ERR_NOORIGIN: &str = "409";
pub const ERR_NORECIPIENT: &str = "411";
pub const ERR_NOTEXTTOSEND: &str = "412";
pub const ERR_NOTOPLEVEL: &str = "413";
pub const ERR_WILDTOPLEVEL: &str = "414";
pub const ERR_UNKNOWNCOMMAND: &str = "421";
pub const ERR_NOMOTD: &str = "422";
pub const ERR_NOADMININFO: &str = "423";
pub const ERR_FILEERROR: &str = "424";
pub const ERR_NONICKNAMEGIVEN: &str = "431";
pub const ERR_ERRONEUSNICKNAME: &str = "432";
pub const ERR_NICKNAMEINUSE: &str = "433";
pub const ERR_NICKCOLLISION: &str = "436";
pub const ERR_USERNOTINCHANNEL: &str = "441";
pub const ERR_NOTONCHANNEL: &str = "442";
pub const ERR_USERONCHANNEL: &str = "443";
pub const ERR_NOLOGIN: &str = "444";
pub const ERR_SUMMONDISABLED: &str = "445";
pub const ERR_USERSDISABLED: &str = "446";
pub const ERR_NOTREGISTERED: &str = "451";
pub const ERR_NEEDMOREPARAMS: &str = "461";
pub const ERR_ALREADYREGISTRED: &str = "462";
pub const ERR_NOPERMFORHOST: &str = "463";
pub const ERR_PASSWDMISMATCH: &str = "464";
pub const ERR_YOUREBANNEDCREEP: &str = "465";
pub const ERR_KEYSET: &str = "467";
pub const ERR_CHANNELISFULL: &str = "471";
pub const ERR_UNKNOWNMODE: &str = "472";
pub const ERR_INVITEONLYCHAN: &str = "473";
pub const ERR_BANNEDFROMCHAN: &str = "474";
pub const ERR_BADCHANNELKEY: &str = "475";
pub const ERR_NOPRIVILEGES: &str = "481";
pub const ERR_CHANOPRIVSNEEDED: &str = "482";
pub const ERR_CANTKILLSERVER: &str = "483";
pub const ERR_NOOPERHOST: &str = "491";
pub const ERR_UMODEUNKNOWNFLAG: &str = "501";
pub const ERR_USERSDONTMATCH: &str = "502";
